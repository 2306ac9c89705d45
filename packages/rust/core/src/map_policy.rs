//! Source map policy: from the `map` option and the build environment to the
//! effective per-file map settings.

use stylesmith_engine::MapOptions;
use stylesmith_shared::MapConfig;

use crate::host::BuildContext;

/// Environment key consulted to detect development builds.
pub const ENV_KEY: &str = "BUILD_ENV";

/// Value of [`ENV_KEY`] marking a development build.
pub const DEVELOPMENT: &str = "development";

/// Whether the build runs in development mode.
pub fn is_development(ctx: &dyn BuildContext) -> bool {
    ctx.env(ENV_KEY) == Some(DEVELOPMENT)
}

/// Effective map settings, or `None` when maps are disabled.
///
/// An unset `map` means inline maps in development and none otherwise; an
/// explicit `false` always disables them.
pub fn effective_map(map: Option<MapConfig>, development: bool) -> Option<MapOptions> {
    let inline = match map {
        None if development => true,
        None | Some(MapConfig::Enabled(false)) => return None,
        Some(MapConfig::Enabled(true)) => true,
        Some(MapConfig::Options { inline: Some(inline) }) => inline,
        Some(MapConfig::Options { inline: None }) => development,
    };

    Some(MapOptions {
        inline,
        sources_content: true,
        prev: None,
    })
}
