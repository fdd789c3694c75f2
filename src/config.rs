use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;

use crate::forwarder::ForwarderConfig;
use crate::rate_limit::RateLimitConfig;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "booking-intake")]
#[command(about = "Booking request intake: rate limits submissions and relays them to the bookings sheet")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // Spreadsheet webhook that receives accepted bookings
    #[arg(short, long, env = "BOOKING_WEBHOOK_URL")]
    pub webhook_url: String,

    // Webhook request timeout in seconds
    #[arg(long, env = "BOOKING_WEBHOOK_TIMEOUT", default_value_t = 15)]
    pub webhook_timeout: u64,

    // Redirects to follow before judging the response (0 = judge the redirect itself)
    #[arg(long, env = "BOOKING_WEBHOOK_MAX_REDIRECTS", default_value_t = 0)]
    pub max_redirects: usize,

    #[arg(long, env = "BOOKING_USER_AGENT", default_value = "Mozilla/5.0 (compatible; TeamRive/1.0)")]
    pub user_agent: String,

    // Max submissions per IP per ip_window
    #[arg(long, env = "BOOKING_IP_LIMIT", default_value_t = 3)]
    pub ip_limit: usize,

    // IP window in seconds
    #[arg(long, env = "BOOKING_IP_WINDOW", default_value_t = 3600)]
    pub ip_window: u64,

    // Max submissions per email per email_window
    #[arg(long, env = "BOOKING_EMAIL_LIMIT", default_value_t = 2)]
    pub email_limit: usize,

    // Email window in seconds
    #[arg(long, env = "BOOKING_EMAIL_WINDOW", default_value_t = 1800)]
    pub email_window: u64,

    // Minimum gap between two submissions from one email, in seconds
    #[arg(long, env = "BOOKING_EMAIL_COOLDOWN", default_value_t = 300)]
    pub email_cooldown: u64,

    // Ledger sweep interval in seconds
    #[arg(long, env = "BOOKING_SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if !(self.webhook_url.starts_with("http://") || self.webhook_url.starts_with("https://")) {
            bail!("webhook url must be http(s), got {:?}", self.webhook_url);
        }
        if self.webhook_timeout == 0 {
            bail!("webhook timeout must be greater than 0");
        }
        if self.ip_limit == 0 || self.email_limit == 0 {
            bail!("rate limits must be greater than 0");
        }
        if self.ip_window == 0 || self.email_window == 0 || self.email_cooldown == 0 {
            bail!("rate limit windows must be greater than 0");
        }
        if self.email_cooldown > self.email_window {
            bail!("email cooldown cannot exceed the email window");
        }
        if self.sweep_interval == 0 {
            bail!("sweep interval must be greater than 0");
        }
        Ok(())
    }

    // Host may be a name; the listener resolves it
    pub fn bind_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            ip_limit: self.ip_limit,
            ip_window: Duration::from_secs(self.ip_window),
            email_limit: self.email_limit,
            email_window: Duration::from_secs(self.email_window),
            email_cooldown: Duration::from_secs(self.email_cooldown),
        }
    }

    pub fn forwarder_config(&self) -> ForwarderConfig {
        ForwarderConfig {
            url: self.webhook_url.clone(),
            timeout: Duration::from_secs(self.webhook_timeout),
            user_agent: self.user_agent.clone(),
            max_redirects: self.max_redirects,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://script.example.com/macros/s/abc/exec";

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["booking-intake", "--webhook-url", URL];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("arguments should parse")
    }

    #[test]
    fn explicit_flags_are_carried_into_configs() {
        let args = parse(&[
            "--port", "9090",
            "--host", "127.0.0.1",
            "--webhook-timeout", "5",
            "--ip-limit", "10",
            "--ip-window", "600",
            "--email-limit", "4",
            "--email-window", "900",
            "--email-cooldown", "60",
            "--sweep-interval", "30",
        ]);
        assert!(args.validate().is_ok());

        let limits = args.rate_limit_config();
        assert_eq!(limits.ip_limit, 10);
        assert_eq!(limits.ip_window, Duration::from_secs(600));
        assert_eq!(limits.email_limit, 4);
        assert_eq!(limits.email_window, Duration::from_secs(900));
        assert_eq!(limits.email_cooldown, Duration::from_secs(60));

        let forwarder = args.forwarder_config();
        assert_eq!(forwarder.url, URL);
        assert_eq!(forwarder.timeout, Duration::from_secs(5));

        assert_eq!(args.sweep_interval(), Duration::from_secs(30));

        assert_eq!(args.bind_addr(), ("127.0.0.1", 9090));
    }

    #[test]
    fn webhook_url_is_required() {
        // skip when the deployment variable leaks into the test environment
        if std::env::var_os("BOOKING_WEBHOOK_URL").is_some() {
            return;
        }
        assert!(Args::try_parse_from(["booking-intake"]).is_err());
    }

    #[test]
    fn nonsensical_settings_fail_validation() {
        let mut args = parse(&[]);

        args.webhook_url = "ftp://example.com".to_string();
        assert!(args.validate().is_err());

        let mut args = parse(&[]);
        args.ip_limit = 0;
        assert!(args.validate().is_err());

        let mut args = parse(&[]);
        args.email_window = 0;
        assert!(args.validate().is_err());

        let mut args = parse(&[]);
        args.email_cooldown = args.email_window + 1;
        assert!(args.validate().is_err());

        let mut args = parse(&[]);
        args.webhook_timeout = 0;
        assert!(args.validate().is_err());

        let mut args = parse(&[]);
        args.sweep_interval = 0;
        assert!(args.validate().is_err());
    }

    #[tokio::test]
    async fn host_names_are_resolved_when_binding() {
        let args = parse(&["--host", "localhost", "--port", "0"]);
        let listener = tokio::net::TcpListener::bind(args.bind_addr()).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }
}
