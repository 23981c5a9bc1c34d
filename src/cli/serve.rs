//! Web server command.

use console::style;

use crate::config::Settings;

/// Start the web server.
pub async fn cmd_serve(settings: &Settings, bind: Option<&str>) -> anyhow::Result<()> {
    let (host, port) = match bind {
        Some(bind) => parse_bind_address(bind, &settings.server.host, settings.server.port),
        None => (settings.server.host.clone(), settings.server.port),
    };

    println!(
        "{} Starting parcel scraper at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    println!(
        "  {} concurrent run(s), Press Ctrl+C to stop",
        settings.server.max_concurrent_runs
    );

    crate::server::serve(settings, &host, port).await
}

/// Parse a bind address that can be:
/// - Just a port: "3030" -> default host, port 3030
/// - Just a host: "0.0.0.0" -> 0.0.0.0, default port
/// - Host and port: "0.0.0.0:3030" -> 0.0.0.0:3030
fn parse_bind_address(bind: &str, default_host: &str, default_port: u16) -> (String, u16) {
    if let Ok(port) = bind.parse::<u16>() {
        return (default_host.to_string(), port);
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return (host.to_string(), port);
        }
    }

    (bind.to_string(), default_port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bind_address() {
        assert_eq!(
            parse_bind_address("3030", "0.0.0.0", 10000),
            ("0.0.0.0".to_string(), 3030)
        );
        assert_eq!(
            parse_bind_address("127.0.0.1", "0.0.0.0", 10000),
            ("127.0.0.1".to_string(), 10000)
        );
        assert_eq!(
            parse_bind_address("localhost:8080", "0.0.0.0", 10000),
            ("localhost".to_string(), 8080)
        );
    }
}
