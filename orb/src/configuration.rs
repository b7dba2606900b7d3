use crate::{
    cdr::endianness::{CdrEndianness, CodecSettings, WCharWidth},
    error::{OrbError, OrbResult},
};

/// How alias (typedef) identity is treated when a type travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasPolicy {
    /// Aliases keep their name and are distinguishable from their
    /// underlying type.
    #[default]
    Preserve,
    /// Aliases are written as their underlying type.
    CollapseToBase,
}

pub const DEFAULT_MAX_DEPTH: usize = 128;

#[derive(Debug, PartialEq, Eq, Clone)]
/// This struct specifies the high-level configuration of an [`Orb`](crate::orb::Orb) and of
/// the codecs it creates for its connections.
pub struct OrbConfiguration {
    endianness: CdrEndianness,
    wchar_width: WCharWidth,
    max_depth: usize,
    alias_policy: AliasPolicy,
}

impl OrbConfiguration {
    /// Byte order used for every message this ORB writes.
    pub fn endianness(&self) -> CdrEndianness {
        self.endianness
    }

    /// Width of a wide character code unit on the connections of this ORB.
    pub fn wchar_width(&self) -> WCharWidth {
        self.wchar_width
    }

    /// Maximum nesting accepted while encoding or decoding a value. Every
    /// member, element, branch and recursive step is one level.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn alias_policy(&self) -> AliasPolicy {
        self.alias_policy
    }

    /// The part of the configuration both ends of a connection must share.
    pub fn codec_settings(&self) -> CodecSettings {
        CodecSettings::new(self.endianness, self.wchar_width)
    }
}

impl Default for OrbConfiguration {
    fn default() -> Self {
        Self {
            endianness: CdrEndianness::default(),
            wchar_width: WCharWidth::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            alias_policy: AliasPolicy::default(),
        }
    }
}

/// Builder for the [`OrbConfiguration`]
#[derive(Default)]
pub struct OrbConfigurationBuilder {
    configuration: OrbConfiguration,
}

impl OrbConfigurationBuilder {
    /// Construct a configuration builder with all the default options.
    pub fn new() -> Self {
        Self {
            configuration: Default::default(),
        }
    }

    /// Build a new configuration
    pub fn build(self) -> OrbResult<OrbConfiguration> {
        if self.configuration.max_depth == 0 {
            return Err(OrbError::PreconditionNotMet(
                "maximum nesting depth must be greater than 0".to_string(),
            ));
        }
        Ok(self.configuration)
    }

    pub fn endianness(mut self, endianness: CdrEndianness) -> Self {
        self.configuration.endianness = endianness;
        self
    }

    /// Set the wide character width. Both peers of a connection must use
    /// the same width.
    pub fn wchar_width(mut self, wchar_width: WCharWidth) -> Self {
        self.configuration.wchar_width = wchar_width;
        self
    }

    /// Set the nesting limit guarding recursive values. Defaults to [`DEFAULT_MAX_DEPTH`].
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.configuration.max_depth = max_depth;
        self
    }

    pub fn alias_policy(mut self, alias_policy: AliasPolicy) -> Self {
        self.configuration.alias_policy = alias_policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let configuration = OrbConfigurationBuilder::new().build().unwrap();
        assert_eq!(configuration.max_depth(), DEFAULT_MAX_DEPTH);
        assert_eq!(configuration.wchar_width(), WCharWidth::Two);
        assert_eq!(configuration.endianness(), CdrEndianness::LittleEndian);
        assert_eq!(configuration.alias_policy(), AliasPolicy::Preserve);
    }

    #[test]
    fn zero_depth_is_rejected() {
        assert!(matches!(
            OrbConfigurationBuilder::new().max_depth(0).build(),
            Err(OrbError::PreconditionNotMet(_))
        ));
    }
}
