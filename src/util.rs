const DEFAULT_REDIS_PORT: u16 = 6379;

pub fn get_default_redis_port() -> u16 {
    DEFAULT_REDIS_PORT
}

const REDIS_MONITOR_CONFIG: &str = "REDIS_MONITOR_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "./redis-monitor.json";

/// Config path from the command line, falling back to `REDIS_MONITOR_CONFIG`
/// and then to `./redis-monitor.json`.
pub fn get_config_path(from_args: Option<String>) -> String {
    from_args
        .or_else(|| std::env::var(REDIS_MONITOR_CONFIG).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

const DEFAULT_SMTP_PORT: u16 = 25;

/// Split an SMTP address of the form `host` or `host:port`.
pub fn split_smtp_address(address: &str) -> (&str, u16) {
    match address.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host, port),
            Err(_) => (address, DEFAULT_SMTP_PORT),
        },
        None => (address, DEFAULT_SMTP_PORT),
    }
}
