use camino::Utf8PathBuf;

pub const DEFAULT_LOG_DIRECTIVES: &str = "flowctl=info,flowkv_=info";

pub fn default_home() -> Utf8PathBuf {
    flowkv_config::dirs::default_home().unwrap_or_default()
}
