//! Environment source: MIRRORCAST_SERVER__BIND=0.0.0.0:3000 sets `server.bind`.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};

pub const PREFIX: &str = "MIRRORCAST";

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("client.extra_ignore")
            .with_list_parse_key("client.transient_suffixes")
            .try_parsing(true),
    )
}
