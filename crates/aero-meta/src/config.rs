//! Tunables for the meta layer.

use tracing::debug;

const MIN_TEMP_SIZE_ENV: &str = "AERO_META_MIN_TEMP_SIZE";
const DISABLE_RECT_ENV: &str = "AERO_META_DISABLE_RECT";
const COMPACT_LUMINANCE_ENV: &str = "AERO_META_COMPACT_LUMINANCE";
const FIXED_FUNCTION_CLEAR_ENV: &str = "AERO_META_FIXED_FUNCTION_CLEAR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaConfig {
    /// Smallest edge of a scratch texture allocation.
    pub min_temp_texture_size: u32,
    /// Use rectangle textures for scratch images when the device has them.
    pub prefer_rectangle_textures: bool,
    /// Upload single-channel luminance draws as `LUMINANCE` instead of
    /// widening them to RGBA.
    pub compact_luminance_upload: bool,
    /// Clear through a GLSL program when available instead of vertex colors.
    pub glsl_clear: bool,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            min_temp_texture_size: 16,
            prefer_rectangle_textures: true,
            compact_luminance_upload: false,
            glsl_clear: true,
        }
    }
}

fn parse_truthy(raw: &str) -> bool {
    let v = raw.trim();
    v == "1"
        || v.eq_ignore_ascii_case("true")
        || v.eq_ignore_ascii_case("yes")
        || v.eq_ignore_ascii_case("on")
}

impl MetaConfig {
    /// Defaults overlaid with the `AERO_META_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(MIN_TEMP_SIZE_ENV) {
            match raw.trim().parse::<u32>() {
                Ok(size) if size > 0 => config.min_temp_texture_size = size,
                _ => debug!(value = %raw, "ignoring invalid {MIN_TEMP_SIZE_ENV}"),
            }
        }
        if let Some(raw) = lookup(DISABLE_RECT_ENV) {
            config.prefer_rectangle_textures = !parse_truthy(&raw);
        }
        if let Some(raw) = lookup(COMPACT_LUMINANCE_ENV) {
            config.compact_luminance_upload = parse_truthy(&raw);
        }
        if let Some(raw) = lookup(FIXED_FUNCTION_CLEAR_ENV) {
            config.glsl_clear = !parse_truthy(&raw);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn defaults_without_environment() {
        assert_eq!(MetaConfig::from_lookup(lookup(&[])), MetaConfig::default());
    }

    #[test]
    fn environment_overrides() {
        let config = MetaConfig::from_lookup(lookup(&[
            (MIN_TEMP_SIZE_ENV, " 64 "),
            (DISABLE_RECT_ENV, "YES"),
            (COMPACT_LUMINANCE_ENV, "on"),
            (FIXED_FUNCTION_CLEAR_ENV, "0"),
        ]));
        assert_eq!(
            config,
            MetaConfig {
                min_temp_texture_size: 64,
                prefer_rectangle_textures: false,
                compact_luminance_upload: true,
                glsl_clear: true,
            }
        );
    }

    #[test]
    fn invalid_size_is_ignored() {
        let config = MetaConfig::from_lookup(lookup(&[(MIN_TEMP_SIZE_ENV, "0")]));
        assert_eq!(config.min_temp_texture_size, 16);
        let config = MetaConfig::from_lookup(lookup(&[(MIN_TEMP_SIZE_ENV, "big")]));
        assert_eq!(config.min_temp_texture_size, 16);
    }
}
