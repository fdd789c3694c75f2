use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::debug;

use crate::metrics::LEDGER_KEYS;

// Shared key for clients that arrive without any proxy header
pub const UNKNOWN_IP: &str = "unknown";

// Limits for the three submission windows
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub ip_limit: usize,          // max submissions per IP per ip_window
    pub ip_window: Duration,
    pub email_limit: usize,       // max submissions per email per email_window
    pub email_window: Duration,
    pub email_cooldown: Duration, // no repeat from the same email inside this
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            ip_limit: 3,
            ip_window: Duration::from_secs(60 * 60),
            email_limit: 2,
            email_window: Duration::from_secs(30 * 60),
            email_cooldown: Duration::from_secs(5 * 60),
        }
    }
}

// Why a submission was throttled, checked in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    IpLimit,
    EmailAlreadyAccepted,
    EmailTooRecent,
}

impl Throttle {
    // Short headline shown to the customer
    pub fn error(&self) -> &'static str {
        match self {
            Throttle::IpLimit => "Превышен лимит заявок",
            Throttle::EmailAlreadyAccepted => "Заявка уже принята",
            Throttle::EmailTooRecent => "Заявка уже отправлена",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Throttle::IpLimit => {
                "С вашего IP-адреса было отправлено максимальное количество заявок (3 в час). \
                 Это сделано для защиты от спама. Наш менеджер обязательно свяжется с вами по уже \
                 отправленным заявкам. Если у вас срочный вопрос, попробуйте позже или свяжитесь \
                 с нами по телефону."
            }
            Throttle::EmailAlreadyAccepted => {
                "Вы уже отправляли заявку с этого email адреса в течение последних 30 минут. \
                 Ваша заявка принята и находится в обработке. Наш менеджер обязательно свяжется \
                 с вами в ближайшее время для уточнения всех деталей бронирования."
            }
            Throttle::EmailTooRecent => {
                "Ваша заявка была успешно отправлена менее 5 минут назад и уже обрабатывается. \
                 Повторная отправка не требуется. Наш менеджер свяжется с вами в течение рабочего \
                 дня для подтверждения всех деталей."
            }
        }
    }

    // Metric label
    pub fn rule(&self) -> &'static str {
        match self {
            Throttle::IpLimit => "ip_limit",
            Throttle::EmailAlreadyAccepted => "email_accepted",
            Throttle::EmailTooRecent => "email_recent",
        }
    }
}

// In-memory submission ledger, lost on restart and not shared between processes
pub struct RateLimiter {
    config: RateLimitConfig,
    by_ip: DashMap<String, Vec<Instant>>,
    by_email: DashMap<String, Vec<Instant>>, // sha256(normalized email) -> timestamps
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            by_ip: DashMap::new(),
            by_email: DashMap::new(),
        }
    }

    // Check against the wall clock
    pub fn check(&self, ip: &str, email: Option<&str>) -> Result<(), Throttle> {
        self.check_at(ip, email, Instant::now())
    }

    // Records the submission only if every rule passes. `email` must be normalized.
    // IP entry is locked before the email entry and both are held until the write
    pub fn check_at(&self, ip: &str, email: Option<&str>, now: Instant) -> Result<(), Throttle> {
        let mut ip_entry = self.by_ip.entry(ip.to_string()).or_default();

        if count_within(&ip_entry, now, self.config.ip_window) >= self.config.ip_limit {
            return Err(Throttle::IpLimit);
        }

        let mut email_entry = match email {
            Some(email) => {
                let entry = self.by_email.entry(fingerprint(email)).or_default();

                if count_within(&entry, now, self.config.email_window) >= self.config.email_limit {
                    return Err(Throttle::EmailAlreadyAccepted);
                }
                if count_within(&entry, now, self.config.email_cooldown) >= 1 {
                    return Err(Throttle::EmailTooRecent);
                }
                Some(entry)
            }
            None => None,
        };

        record(&mut ip_entry, now, self.config.ip_window);
        if let Some(entry) = email_entry.as_mut() {
            record(entry, now, self.email_horizon());
        }

        Ok(())
    }

    // Drop expired timestamps and empty keys, returns keys left
    pub fn sweep(&self, now: Instant) -> usize {
        let ip_window = self.config.ip_window;
        self.by_ip.retain(|_, times| {
            times.retain(|t| now.saturating_duration_since(*t) < ip_window);
            !times.is_empty()
        });

        let email_window = self.email_horizon();
        self.by_email.retain(|_, times| {
            times.retain(|t| now.saturating_duration_since(*t) < email_window);
            !times.is_empty()
        });

        self.tracked_keys()
    }

    pub fn tracked_keys(&self) -> usize {
        self.by_ip.len() + self.by_email.len()
    }

    // Longest window any email rule looks back over
    fn email_horizon(&self) -> Duration {
        self.config.email_window.max(self.config.email_cooldown)
    }
}

fn count_within(times: &[Instant], now: Instant, window: Duration) -> usize {
    times
        .iter()
        .filter(|t| now.saturating_duration_since(**t) < window)
        .count()
}

// Append `now` and forget whatever fell out of the window
fn record(times: &mut Vec<Instant>, now: Instant, window: Duration) {
    times.retain(|t| now.saturating_duration_since(*t) < window);
    times.push(now);
}

// Trim + lowercase, blank means no email
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() { None } else { Some(email) }
}

// Ledger key for an email (hash of the normalized address)
pub fn fingerprint(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    format!("{:x}", hasher.finalize())
}

// Background sweeper - runs for the lifetime of the process
pub async fn ledger_sweeper(limiter: Arc<RateLimiter>, sweep_interval: Duration) {
    let mut interval = interval(sweep_interval);

    debug!(interval = ?sweep_interval, "ledger sweeper started");

    loop {
        interval.tick().await;

        let keys = limiter.sweep(Instant::now());
        LEDGER_KEYS.set(keys as i64);

        debug!(keys, "ledger swept");
    }
}
