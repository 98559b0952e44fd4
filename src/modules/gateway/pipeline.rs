//! The admission pipeline.
//!
//! Stages run in a fixed order and the first denial wins:
//!
//! 1. Blacklist
//! 2. Endpoint then global token buckets
//! 3. API key, when required by the runtime settings
//! 4. Session
//! 5. Route requirement and permission set
//!
//! No stage returns an error. Store and cache faults are logged with the
//! request's ip, route, method and stage, then turned into a verdict.

use super::config::GatewayConfig;
use super::request::AdmissionRequest;
use super::settings::SettingsSource;
use super::stats::GatewayStats;
use super::verdict::{Caller, ReasonCode, Verdict};
use crate::modules::access_control::{
    authorize, seed, ApiKeyGate, ApiKeyOutcome, Authorization, PermissionSet, RequirementClass,
    RuleHash, RuleResolver,
};
use crate::modules::blacklist::BlacklistGate;
use crate::modules::escalation::EscalationPolicy;
use crate::modules::rate_limiting::RateLimiter;
use crate::modules::session::{
    token_from, SessionOutcome, SessionRejection, SessionResolver, TokenCodec,
};
use crate::store::{Adapters, StoreResult, ViolationRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything one verdict needs, wired together.
#[derive(Debug)]
pub struct Gateway {
    adapters: Adapters,
    blacklist: Arc<BlacklistGate>,
    limiter: Arc<RateLimiter>,
    escalation: Arc<EscalationPolicy>,
    api_keys: ApiKeyGate,
    sessions: SessionResolver,
    rules: RuleResolver,
    settings: SettingsSource,
    stats: Arc<GatewayStats>,
    token_name: String,
}

impl Gateway {
    /// Build the pipeline over `adapters` and a shared bucket table.
    #[must_use]
    pub fn new(adapters: Adapters, limiter: Arc<RateLimiter>, config: &GatewayConfig) -> Self {
        Self::with_stats(adapters, limiter, config, Arc::new(GatewayStats::new()))
    }

    /// Build the pipeline, counting into existing `stats`.
    #[must_use]
    pub fn with_stats(
        adapters: Adapters,
        limiter: Arc<RateLimiter>,
        config: &GatewayConfig,
        stats: Arc<GatewayStats>,
    ) -> Self {
        let blacklist = Arc::new(BlacklistGate::new(
            adapters.clone(),
            config.blacklist.clone(),
        ));
        let escalation = Arc::new(EscalationPolicy::new(
            adapters.clone(),
            Arc::clone(&blacklist),
        ));

        Self {
            api_keys: ApiKeyGate::new(adapters.clone(), &config.access_control),
            sessions: SessionResolver::new(adapters.clone(), TokenCodec::new(&config.session)),
            rules: RuleResolver::new(adapters.clone()),
            settings: SettingsSource::new(adapters.clone(), config.settings),
            token_name: config.session.token_name.clone(),
            adapters,
            blacklist,
            limiter,
            escalation,
            stats,
        }
    }

    /// Decide whether `request` may proceed.
    pub async fn evaluate(&self, request: &AdmissionRequest) -> Verdict {
        let verdict = self.decide(request).await;
        self.stats.record(&verdict);

        match verdict.reason {
            None => debug!(
                ip = %request.client_ip,
                route = %request.path,
                method = %request.method,
                "Request admitted"
            ),
            Some(reason) => debug!(
                ip = %request.client_ip,
                route = %request.path,
                method = %request.method,
                %reason,
                "Request denied"
            ),
        }

        verdict
    }

    async fn decide(&self, request: &AdmissionRequest) -> Verdict {
        let ip = request.client_ip.as_str();
        let route = request.path.as_str();
        let method = request.method.as_str();

        if self.blacklist.check(ip).await {
            info!(ip, route, method, stage = "blacklist", "Blacklisted caller refused");
            return Verdict::deny(ReasonCode::Blacklisted);
        }

        let settings = self.settings.current().await;

        let limit = self.limiter.check(ip, route, method, &settings.rate_limit);
        if !limit.allowed {
            info!(
                ip,
                route,
                method,
                stage = "rate_limit",
                scope = %limit.scope,
                "Rate limit exceeded"
            );
            let violation = ViolationRecord::now(
                ip,
                request.user_agent().map(str::to_string),
                route,
                method,
            );
            self.escalation.spawn(violation, settings.escalation);
            return Verdict::deny(ReasonCode::RateLimited)
                .with_retry_after(Duration::from_secs(limit.retry_after_secs()));
        }

        if settings.api_key_required {
            let presented = request
                .header(self.api_keys.header_name())
                .or_else(|| request.query(self.api_keys.query_name()));
            match self.api_keys.check(route, presented).await {
                ApiKeyOutcome::Exempt | ApiKeyOutcome::Accepted => {},
                ApiKeyOutcome::Rejected => {
                    debug!(ip, route, method, stage = "api_key", "API key refused");
                    return Verdict::deny(ReasonCode::ApiKeyRejected);
                },
                ApiKeyOutcome::Unavailable => {
                    return Verdict::deny(ReasonCode::ConfigUnavailable);
                },
            }
        }

        let token = token_from(request.authorization(), request.cookie(&self.token_name));
        let session = self.sessions.resolve(token).await;

        let caller = match session {
            SessionOutcome::Anonymous => Some(Caller::Anonymous),
            SessionOutcome::Authenticated(identity) => Some(Caller::Identified(identity)),
            SessionOutcome::Rejected(rejection) => {
                debug!(ip, route, method, stage = "session", %rejection, "Session refused");
                return Verdict::deny(session_reason(rejection));
            },
            SessionOutcome::Unavailable => None,
        };

        let Some(class) = self.requirement(ip, route, method).await else {
            return Verdict::deny(ReasonCode::ConfigUnavailable);
        };

        let Some(caller) = caller else {
            if class == RequirementClass::Common {
                debug!(ip, route, method, stage = "session", "Session unresolved, public route");
                return Verdict::allow(Caller::Anonymous, PermissionSet::empty(), class);
            }
            warn!(ip, route, method, stage = "session", "Session unresolved, refusing");
            return Verdict::deny(ReasonCode::ConfigUnavailable).with_requirement(class);
        };

        let permissions = match caller.identity().map(|identity| identity.id) {
            None => PermissionSet::empty(),
            Some(id) => match self.rules.permissions(id).await {
                Ok(set) => set,
                Err(e) if class == RequirementClass::Default => {
                    warn!(ip, route, method, stage = "rules", error = %e, "Permission set unavailable");
                    return Verdict::deny(ReasonCode::ConfigUnavailable)
                        .with_requirement(class)
                        .with_caller(caller);
                },
                Err(e) => {
                    debug!(ip, route, method, stage = "rules", error = %e, "Permission set unavailable, attaching none");
                    PermissionSet::empty()
                },
            },
        };

        let hash = RuleHash::of(method, route);
        match authorize(class, !caller.is_anonymous(), &permissions, &hash) {
            Authorization::Granted => Verdict::allow(caller, permissions, class),
            Authorization::Unauthenticated => {
                Verdict::deny(ReasonCode::Unauthenticated).with_requirement(class)
            },
            Authorization::Forbidden => Verdict::deny(ReasonCode::Forbidden)
                .with_requirement(class)
                .with_caller(caller),
        }
    }

    /// Requirement class, or `None` when it cannot be determined and the
    /// route is not a seeded public one.
    async fn requirement(&self, ip: &str, route: &str, method: &str) -> Option<RequirementClass> {
        match self.rules.requirement(method, route).await {
            Ok(class) => Some(class),
            Err(e) => match seed::seeded_class(method, route) {
                Some(RequirementClass::Common) => {
                    warn!(ip, route, method, stage = "rules", error = %e, "Rule lookup failed, seeded public route");
                    Some(RequirementClass::Common)
                },
                _ => {
                    warn!(ip, route, method, stage = "rules", error = %e, "Rule lookup failed, refusing");
                    None
                },
            },
        }
    }

    /// Insert missing built-in rules and create the root group on an empty
    /// store. Returns the number of rules inserted and whether the root
    /// group was created.
    ///
    /// # Errors
    ///
    /// Returns the first store error.
    pub async fn seed(&self, rules: bool, root_group: bool) -> StoreResult<(usize, bool)> {
        let inserted = if rules {
            seed::seed_rules(&self.adapters).await?
        } else {
            0
        };
        let created = if root_group {
            seed::bootstrap_root_group(&self.adapters).await?
        } else {
            false
        };
        Ok((inserted, created))
    }

    /// The blacklist gate, for administrative bans.
    #[must_use]
    pub fn blacklist(&self) -> &Arc<BlacklistGate> {
        &self.blacklist
    }

    /// The shared bucket table.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The escalation policy.
    #[must_use]
    pub fn escalation(&self) -> &Arc<EscalationPolicy> {
        &self.escalation
    }

    /// The session resolver, for token issue and identity invalidation.
    #[must_use]
    pub fn sessions(&self) -> &SessionResolver {
        &self.sessions
    }

    /// The rule resolver, for membership changes and invalidation.
    #[must_use]
    pub fn rules(&self) -> &RuleResolver {
        &self.rules
    }

    /// The runtime settings source.
    #[must_use]
    pub fn settings(&self) -> &SettingsSource {
        &self.settings
    }

    /// Pipeline counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    /// Cookie the session token is read from.
    #[must_use]
    pub fn token_name(&self) -> &str {
        &self.token_name
    }
}

fn session_reason(rejection: SessionRejection) -> ReasonCode {
    if rejection.is_expiry() {
        ReasonCode::SessionExpired
    } else {
        ReasonCode::SessionInvalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::access_control::{PermissionGroup, RuleSet};
    use crate::modules::rate_limiting::RateLimitConfig;
    use crate::modules::session::Identity;
    use crate::store::{BlacklistEntry, Cache, GateStore, MemoryCache, MemoryStore, Timeouts};

    struct Fixture {
        gateway: Gateway,
        store: Arc<MemoryStore>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let adapters = Adapters::new(
            Arc::clone(&store) as Arc<dyn GateStore>,
            Arc::new(MemoryCache::new()) as Arc<dyn Cache>,
            Timeouts::default(),
        );
        let limiter = Arc::new(RateLimiter::new(&RateLimitConfig::default()));
        let gateway = Gateway::new(adapters, limiter, &GatewayConfig::default());
        gateway.seed(true, false).await.unwrap();
        Fixture { gateway, store }
    }

    fn signed_in(gateway: &Gateway, identity: &Identity, method: &str, path: &str) -> AdmissionRequest {
        let token = gateway.sessions().codec().issue(identity).unwrap();
        AdmissionRequest::new("10.0.0.9", method, path)
            .with_header("Authorization", format!("Bearer {token}"))
    }

    #[tokio::test]
    async fn test_anonymous_on_public_route() {
        let f = fixture().await;
        let verdict = f
            .gateway
            .evaluate(&AdmissionRequest::new("10.0.0.1", "GET", "/api/tags/all"))
            .await;
        assert!(verdict.is_allowed());
        assert!(verdict.caller.is_anonymous());
        assert_eq!(verdict.requirement, Some(RequirementClass::Common));
    }

    #[tokio::test]
    async fn test_anonymous_on_gated_route() {
        let f = fixture().await;
        let verdict = f
            .gateway
            .evaluate(&AdmissionRequest::new("10.0.0.1", "GET", "/api/ip-black/all"))
            .await;
        assert_eq!(verdict.reason, Some(ReasonCode::Unauthenticated));

        let verdict = f
            .gateway
            .evaluate(&AdmissionRequest::new("10.0.0.1", "GET", "/not/seeded"))
            .await;
        assert_eq!(verdict.reason, Some(ReasonCode::Unauthenticated));
    }

    #[tokio::test]
    async fn test_blacklist_wins_over_everything() {
        let f = fixture().await;
        f.gateway
            .blacklist()
            .ban(BlacklistEntry::new("10.6.6.6", "manual"))
            .await
            .unwrap();

        let verdict = f
            .gateway
            .evaluate(&AdmissionRequest::new("10.6.6.6", "GET", "/api/tags/all"))
            .await;
        assert_eq!(verdict.reason, Some(ReasonCode::Blacklisted));
        assert_eq!(verdict.status_code(), 406);
        assert_eq!(f.gateway.limiter().total_checks(), 0);
    }

    #[tokio::test]
    async fn test_permission_granted_by_hash() {
        let f = fixture().await;
        let identity = Identity::new(7, "editor", "pw-hash");
        f.store.put_identity(identity.clone());
        f.store
            .save_group(
                PermissionGroup::new(2, "editors")
                    .with_members([7])
                    .with_rules(RuleSet::of([RuleHash::of("GET", "/api/ip-black/all")])),
            )
            .await
            .unwrap();

        let allowed = f
            .gateway
            .evaluate(&signed_in(&f.gateway, &identity, "GET", "/api/ip-black/all"))
            .await;
        assert!(allowed.is_allowed());
        assert_eq!(allowed.identity().map(|i| i.id), Some(7));
        assert!(allowed.permissions.permits(&RuleHash::of("GET", "/api/ip-black/all")));

        let denied = f
            .gateway
            .evaluate(&signed_in(&f.gateway, &identity, "DELETE", "/api/ip-black/delete"))
            .await;
        assert_eq!(denied.reason, Some(ReasonCode::Forbidden));
    }

    #[tokio::test]
    async fn test_rejected_token_denies_public_route() {
        let f = fixture().await;
        let request = AdmissionRequest::new("10.0.0.1", "GET", "/api/tags/all")
            .with_header("Authorization", "Bearer not-a-token");
        let verdict = f.gateway.evaluate(&request).await;
        assert_eq!(verdict.reason, Some(ReasonCode::SessionInvalid));
        assert!(verdict.clear_cookie);
    }

    #[tokio::test]
    async fn test_store_fault_fails_open_only_on_seeded_public_routes() {
        let f = fixture().await;
        f.gateway.blacklist().refresh().await.unwrap();
        f.store.set_offline(true);

        let public = f
            .gateway
            .evaluate(&AdmissionRequest::new("10.0.0.2", "GET", "/api/article/one"))
            .await;
        assert!(public.is_allowed());

        let gated = f
            .gateway
            .evaluate(&AdmissionRequest::new("10.0.0.2", "GET", "/api/auth-rules/all"))
            .await;
        assert_eq!(gated.reason, Some(ReasonCode::ConfigUnavailable));
        assert_eq!(gated.status_code(), 503);
    }

    #[tokio::test]
    async fn test_stats_follow_verdicts() {
        let f = fixture().await;
        f.gateway
            .evaluate(&AdmissionRequest::new("10.0.0.3", "GET", "/api/tags/all"))
            .await;
        f.gateway
            .evaluate(&AdmissionRequest::new("10.0.0.3", "GET", "/api/ip-black/all"))
            .await;

        assert_eq!(f.gateway.stats().evaluations(), 2);
        assert_eq!(f.gateway.stats().allowed(), 1);
        assert_eq!(f.gateway.stats().denied(ReasonCode::Unauthenticated), 1);
    }
}
