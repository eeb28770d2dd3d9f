//! Environment source: CTXZONE__SECTION__KEY overrides, e.g.
//! `CTXZONE__LOGGING__LEVEL=debug` or
//! `CTXZONE__CONTEXT__DEFAULT_CAPABILITIES=interval,promise`.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const PREFIX: &str = "CTXZONE";

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("context.default_capabilities"),
    )
}
