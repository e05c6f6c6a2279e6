//! robots.txt consultation with a two-tier (in-process + Redis) cache.
//!
//! Every fetch, unless `respect_robots_txt` is off, resolves the request's
//! origin and asks whether its path is allowed for our user agent. robots.txt
//! itself is fetched at most once per origin per cache TTL; any failure to
//! fetch or parse it fails open (allow-all), matching the original's
//! `RobotsHandler`.

use crate::config::IrisConfig;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

pub struct RobotsOracle {
    user_agent: String,
    respect_robots_txt: bool,
    cache_ttl_secs: u64,
    redis: Option<redis::aio::ConnectionManager>,
    http: reqwest::Client,
    memory: DashMap<String, Arc<robotstxt_rs::RobotsTxt>>,
    /// Single-flight lock per origin: concurrent misses for the same origin
    /// coalesce into one fetch instead of issuing N parallel GETs.
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl RobotsOracle {
    pub async fn new(config: &IrisConfig) -> Self {
        let redis = match &config.redis_url {
            Some(url) => match redis::Client::open(url.as_str()) {
                Ok(client) => match client.get_connection_manager().await {
                    Ok(manager) => Some(manager),
                    Err(e) => {
                        warn!("Robots oracle: failed to connect to Redis: {}", e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Robots oracle: invalid REDIS_URL: {}", e);
                    None
                }
            },
            None => None,
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_default();

        Self {
            user_agent: config.user_agent.clone(),
            respect_robots_txt: config.respect_robots_txt,
            cache_ttl_secs: config.cache_ttl_seconds,
            redis,
            http,
            memory: DashMap::new(),
            inflight: DashMap::new(),
        }
    }

    /// Whether `url` may be fetched under the origin's robots.txt.
    pub async fn can_fetch(&self, url: &str) -> bool {
        if !self.respect_robots_txt {
            return true;
        }

        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let Some(host) = parsed.host_str() else {
            return true;
        };
        let origin = format!(
            "{}://{}{}",
            parsed.scheme(),
            host,
            parsed
                .port()
                .map(|p| format!(":{p}"))
                .unwrap_or_default()
        );

        let robots = self.get_robots(&origin).await;
        match robots {
            Some(robots) => robots.can_fetch(&self.user_agent, url),
            None => true,
        }
    }

    async fn get_robots(&self, origin: &str) -> Option<Arc<robotstxt_rs::RobotsTxt>> {
        if let Some(cached) = self.memory.get(origin) {
            return Some(Arc::clone(&cached));
        }

        // Single-flight: concurrent misses for this origin wait on the same
        // lock rather than each issuing their own fetch. Whichever task gets
        // the lock first populates `memory`; the rest see the cache hit once
        // they acquire it.
        let lock = Arc::clone(
            self.inflight
                .entry(origin.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let _guard = lock.lock().await;

        if let Some(cached) = self.memory.get(origin) {
            return Some(Arc::clone(&cached));
        }

        if let Some(redis) = &self.redis {
            if let Some(body) = self.redis_get(redis.clone(), origin).await {
                let robots = Arc::new(robotstxt_rs::RobotsTxt::parse(&body));
                self.memory.insert(origin.to_string(), Arc::clone(&robots));
                return Some(robots);
            }
        }

        let robots_url = format!("{origin}/robots.txt");
        match self.http.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.text().await.unwrap_or_default();
                let robots = Arc::new(robotstxt_rs::RobotsTxt::parse(&body));
                self.memory.insert(origin.to_string(), Arc::clone(&robots));

                if let Some(redis) = &self.redis {
                    self.redis_set(redis.clone(), origin, &body).await;
                }

                Some(robots)
            }
            Ok(_) => {
                // Non-200 (including 404): no robots.txt, allow everything.
                let robots = Arc::new(robotstxt_rs::RobotsTxt::parse(""));
                self.memory.insert(origin.to_string(), Arc::clone(&robots));
                Some(robots)
            }
            Err(e) => {
                warn!("Failed to fetch robots.txt for {}: {}", origin, e);
                None
            }
        }
    }

    async fn redis_get(&self, mut conn: redis::aio::ConnectionManager, origin: &str) -> Option<String> {
        use redis::AsyncCommands;
        match conn.get::<_, Option<String>>(format!("iris:robots:{origin}")).await {
            Ok(value) => value,
            Err(e) => {
                debug!("Redis robots cache read failed for {}: {}", origin, e);
                None
            }
        }
    }

    async fn redis_set(&self, mut conn: redis::aio::ConnectionManager, origin: &str, body: &str) {
        use redis::AsyncCommands;
        let key = format!("iris:robots:{origin}");
        if let Err(e) = conn
            .set_ex::<_, _, ()>(&key, body, self.cache_ttl_secs.max(1))
            .await
        {
            debug!("Redis robots cache write failed for {}: {}", origin, e);
        }
    }
}
