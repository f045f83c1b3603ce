use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

pub const KEY_PERSIST: &str = "auth:persist";
pub const KEY_ACCESS: &str = "auth:access";
pub const KEY_REFRESH: &str = "auth:refresh";
pub const KEY_ROLE: &str = "auth:role";
pub const KEY_PERMS: &str = "auth:perms";
pub const KEY_MODE: &str = "auth:mode";
pub const KEY_META: &str = "auth:meta";

const RECORD_KEYS: [&str; 6] = [
    KEY_ACCESS, KEY_REFRESH, KEY_ROLE, KEY_PERMS, KEY_MODE, KEY_META,
];

#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    pub clock_skew_secs: i64,
    /// Used when nothing was persisted yet.
    pub auth_mode: AuthMode,
    /// Used when nothing was persisted yet.
    pub persist_tier: PersistTier,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            clock_skew_secs: 30,
            auth_mode: AuthMode::Token,
            persist_tier: PersistTier::Ephemeral,
        }
    }
}

#[derive(Debug, Clone)]
struct SessionState {
    record: CredentialRecord,
    tier: PersistTier,
    mode: AuthMode,
}

/// Owner of the credential record.
///
/// Every mutation mirrors the record into the active tier, publishes the
/// armed expiry on the watch channel and tells other contexts about it.
/// Storage failures are logged and never undo the in-memory change.
pub struct SessionStore {
    state: RwLock<SessionState>,
    tab_store: Arc<dyn KeyValueStore>,
    durable_store: Arc<dyn KeyValueStore>,
    channel: Arc<dyn SessionChannel>,
    clock: Arc<dyn Clock>,
    origin: ContextId,
    clock_skew_secs: i64,
    expiry: watch::Sender<Option<i64>>,
}

impl SessionStore {
    /// Builds the store and rehydrates it from whichever tier was last selected.
    pub fn new(
        config: SessionStoreConfig,
        tab_store: Arc<dyn KeyValueStore>,
        durable_store: Arc<dyn KeyValueStore>,
        channel: Arc<dyn SessionChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (expiry, _) = watch::channel(None);
        let store = Self {
            state: RwLock::new(SessionState {
                record: CredentialRecord::default(),
                tier: config.persist_tier,
                mode: config.auth_mode,
            }),
            tab_store,
            durable_store,
            channel,
            clock,
            origin: ContextId::generate(),
            clock_skew_secs: config.clock_skew_secs.max(0),
            expiry,
        };
        store.restore(config.persist_tier, config.auth_mode);
        store
    }

    pub fn origin(&self) -> &ContextId {
        &self.origin
    }

    pub fn now_unix(&self) -> i64 {
        self.clock.now_unix()
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_for(&self, tier: PersistTier) -> Option<&Arc<dyn KeyValueStore>> {
        match tier {
            PersistTier::Ephemeral => None,
            PersistTier::TabScoped => Some(&self.tab_store),
            PersistTier::Durable => Some(&self.durable_store),
        }
    }

    // ---- reads ----

    pub fn access_token(&self) -> Option<String> {
        self.read().record.access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().record.refresh_token.clone()
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.read().mode
    }

    pub fn persist_tier(&self) -> PersistTier {
        self.read().tier
    }

    pub fn snapshot(&self) -> CredentialRecord {
        self.read().record.clone()
    }

    pub fn permissions(&self) -> BTreeSet<String> {
        self.read().record.permissions.clone()
    }

    /// Expired iff `now >= expires_at - skew`. Unknown expiry is never expired.
    pub fn is_expired(&self) -> bool {
        match self.read().record.expires_at {
            Some(exp) => self.clock.now_unix() >= exp - self.clock_skew_secs,
            None => false,
        }
    }

    pub fn seconds_to_expiry(&self) -> Option<i64> {
        self.read()
            .record
            .expires_at
            .map(|exp| (exp - self.clock.now_unix()).max(0))
    }

    /// Expiry the proactive refresh should aim at, `None` when nothing to arm.
    pub fn subscribe_expiry(&self) -> watch::Receiver<Option<i64>> {
        self.expiry.subscribe()
    }

    // ---- mutations ----

    /// Replaces the access token and re-derives claims from it. A missing
    /// `refresh_token` keeps the current one.
    pub fn set_credentials(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        persist_tier: Option<PersistTier>,
    ) {
        {
            let mut state = self.write();
            if let Some(tier) = persist_tier {
                self.switch_tier_locked(&mut state, tier);
            }
            let record = &mut state.record;
            record.access_token = Some(access_token.to_owned());
            if let Some(refresh) = refresh_token {
                record.refresh_token = Some(refresh.to_owned());
            }

            let claims = decode_claims(access_token);
            if claims.is_none() {
                tracing::debug!("access token carries no readable claims, treating as opaque");
            }
            let claims = claims.unwrap_or_default();
            record.expires_at = claims.exp;
            record.issued_at = claims.iat;
            record.subject = claims.sub;
            // Hints from the previous token do not outlive it.
            if record.claims_source == ClaimsSource::TokenHint {
                record.role = GUEST_ROLE.to_owned();
                record.permissions.clear();
                record.claims_source = ClaimsSource::None;
            }
            let mut hinted = false;
            if let Some(role) = claims.role.filter(|role| !role.is_empty()) {
                record.role = role;
                hinted = true;
            }
            if let Some(permissions) = claims.permissions {
                record.permissions = permissions.into_iter().collect();
                hinted = true;
            }
            if hinted {
                record.claims_source = ClaimsSource::TokenHint;
            }
            self.persist_locked(&state);
        }
        self.publish_expiry();
        self.broadcast(SessionEvent::Updated);
    }

    /// Server-confirmed role.
    pub fn set_role(&self, role: &str) {
        {
            let mut state = self.write();
            state.record.role = if role.trim().is_empty() {
                GUEST_ROLE.to_owned()
            } else {
                role.to_owned()
            };
            state.record.claims_source = ClaimsSource::Server;
            self.persist_locked(&state);
        }
        self.broadcast(SessionEvent::Updated);
    }

    /// Server-confirmed permission set.
    pub fn set_permissions<I, S>(&self, permissions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut state = self.write();
            state.record.permissions = permissions.into_iter().map(Into::into).collect();
            state.record.claims_source = ClaimsSource::Server;
            self.persist_locked(&state);
        }
        self.broadcast(SessionEvent::Updated);
    }

    /// Applies role and permissions from the identity endpoint in one mutation.
    /// Absent fields leave the current value alone.
    pub fn apply_identity(&self, identity: &Identity) {
        {
            let mut state = self.write();
            if let Some(role) = identity.role.as_deref().filter(|role| !role.is_empty()) {
                state.record.role = role.to_owned();
            }
            if let Some(permissions) = &identity.permissions {
                state.record.permissions = permissions.iter().cloned().collect();
            }
            state.record.claims_source = ClaimsSource::Server;
            self.persist_locked(&state);
        }
        self.broadcast(SessionEvent::Updated);
    }

    /// Moves the record into `tier` and wipes it from the previous one.
    pub fn set_persist_tier(&self, tier: PersistTier) {
        {
            let mut state = self.write();
            if state.tier == tier {
                return;
            }
            self.switch_tier_locked(&mut state, tier);
            self.persist_locked(&state);
        }
        self.broadcast(SessionEvent::Updated);
    }

    pub fn set_auth_mode(&self, mode: AuthMode) {
        {
            let mut state = self.write();
            if state.mode == mode {
                return;
            }
            tracing::info!("auth mode {} -> {}", state.mode, mode);
            state.mode = mode;
            self.persist_locked(&state);
        }
        self.publish_expiry();
        self.broadcast(SessionEvent::Updated);
    }

    /// Wipes memory and both tiers, disarms proactive refresh and tells
    /// other contexts to log out.
    pub fn clear(&self) {
        self.wipe();
        self.broadcast(SessionEvent::LoggedOut);
    }

    /// Same wipe as [`clear`](Self::clear) without rebroadcasting; used when
    /// the logout came from another context.
    pub fn apply_remote_logout(&self) {
        self.wipe();
    }

    /// Replaces local state wholesale with the persisted copy. Without a
    /// persisted tier marker there is nothing authoritative and local state
    /// is kept.
    pub fn reload_from_storage(&self) {
        let Some(tier) = self.persisted_tier() else {
            tracing::debug!("no persisted session tier, keeping local state");
            return;
        };
        {
            let mut state = self.write();
            state.tier = tier;
            if let Some(mode) = self.persisted_mode() {
                state.mode = mode;
            }
            state.record = match self.store_for(tier) {
                Some(store) => self.load_record(store.as_ref()),
                None => CredentialRecord::default(),
            };
        }
        self.publish_expiry();
    }

    // ---- internals ----

    fn wipe(&self) {
        {
            let mut state = self.write();
            state.record = CredentialRecord::default();
            for store in [&self.tab_store, &self.durable_store] {
                remove_keys(store.as_ref(), &RECORD_KEYS);
            }
        }
        self.publish_expiry();
    }

    fn restore(&self, default_tier: PersistTier, default_mode: AuthMode) {
        let tier = self.persisted_tier().unwrap_or(default_tier);
        let mode = self.persisted_mode().unwrap_or(default_mode);
        {
            let mut state = self.write();
            state.tier = tier;
            state.mode = mode;
            if let Some(store) = self.store_for(tier) {
                state.record = self.load_record(store.as_ref());
            }
            if state.record.access_token.is_some() {
                tracing::info!(
                    "restored session from {} tier (role={})",
                    tier,
                    state.record.role
                );
            }
        }
        self.publish_expiry();
    }

    fn persisted_tier(&self) -> Option<PersistTier> {
        [&self.durable_store, &self.tab_store]
            .into_iter()
            .find_map(|store| read_key(store.as_ref(), KEY_PERSIST))
            .and_then(|raw| raw.parse().ok())
    }

    fn persisted_mode(&self) -> Option<AuthMode> {
        [&self.durable_store, &self.tab_store]
            .into_iter()
            .find_map(|store| read_key(store.as_ref(), KEY_MODE))
            .and_then(|raw| raw.parse().ok())
    }

    fn load_record(&self, store: &dyn KeyValueStore) -> CredentialRecord {
        let mut record = CredentialRecord {
            access_token: read_key(store, KEY_ACCESS),
            refresh_token: read_key(store, KEY_REFRESH),
            ..CredentialRecord::default()
        };
        let role = read_key(store, KEY_ROLE);
        let permissions = read_key(store, KEY_PERMS).map(|raw| {
            serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable {}: {}", KEY_PERMS, e);
                Vec::new()
            })
        });
        let meta = read_key(store, KEY_META)
            .and_then(|raw| serde_json::from_str::<CredentialMeta>(&raw).ok())
            .unwrap_or_default();

        let claims = record
            .access_token
            .as_deref()
            .and_then(decode_claims)
            .unwrap_or_default();
        record.expires_at = claims.exp.or(meta.exp);
        record.issued_at = claims.iat.or(meta.iat);
        record.subject = claims.sub.or(meta.sub);

        match (role, claims.role) {
            (Some(role), _) => record.role = role,
            (None, Some(role)) => {
                record.role = role;
                record.claims_source = ClaimsSource::TokenHint;
            }
            (None, None) => {}
        }
        match (permissions, claims.permissions) {
            (Some(permissions), _) => record.permissions = permissions.into_iter().collect(),
            (None, Some(permissions)) => {
                record.permissions = permissions.into_iter().collect();
                record.claims_source = ClaimsSource::TokenHint;
            }
            (None, None) => {}
        }
        record
    }

    fn switch_tier_locked(&self, state: &mut SessionState, tier: PersistTier) {
        if state.tier == tier {
            return;
        }
        tracing::info!("session persistence {} -> {}", state.tier, tier);
        if let Some(previous) = self.store_for(state.tier) {
            remove_keys(previous.as_ref(), &RECORD_KEYS);
            remove_keys(previous.as_ref(), &[KEY_PERSIST]);
        }
        state.tier = tier;
    }

    fn persist_locked(&self, state: &SessionState) {
        let Some(store) = self.store_for(state.tier) else {
            return;
        };
        let record = &state.record;
        let meta = CredentialMeta {
            exp: record.expires_at,
            iat: record.issued_at,
            sub: record.subject.clone(),
        };
        let permissions = record.permissions.iter().collect::<Vec<_>>();
        let result = (|| -> Result<(), StoreError> {
            match &record.access_token {
                Some(token) => store.set(KEY_ACCESS, token)?,
                None => store.remove(KEY_ACCESS)?,
            }
            match &record.refresh_token {
                Some(token) => store.set(KEY_REFRESH, token)?,
                None => store.remove(KEY_REFRESH)?,
            }
            store.set(KEY_ROLE, &record.role)?;
            store.set(
                KEY_PERMS,
                &serde_json::to_string(&permissions).unwrap_or_else(|_| "[]".to_owned()),
            )?;
            store.set(KEY_PERSIST, state.tier.as_str())?;
            store.set(KEY_MODE, state.mode.as_str())?;
            store.set(
                KEY_META,
                &serde_json::to_string(&meta).unwrap_or_else(|_| "{}".to_owned()),
            )?;
            Ok(())
        })();
        if let Err(e) = result {
            tracing::warn!("failed to persist session to {} tier: {}", state.tier, e);
        }
    }

    fn armed_expiry(&self) -> Option<i64> {
        let state = self.read();
        if !state.mode.sends_bearer() || state.record.access_token.is_none() {
            return None;
        }
        state.record.expires_at
    }

    fn publish_expiry(&self) {
        self.expiry.send_replace(self.armed_expiry());
    }

    fn broadcast(&self, event: SessionEvent) {
        self.channel.publish(SessionMessage {
            origin: self.origin.clone(),
            event,
        });
    }
}

impl SessionView for SessionStore {
    fn is_authenticated(&self) -> bool {
        let (mode, has_token, guest) = {
            let state = self.read();
            (
                state.mode,
                state.record.access_token.is_some(),
                state.record.is_guest(),
            )
        };
        match mode {
            AuthMode::Cookie => !guest,
            AuthMode::Token | AuthMode::Hybrid => has_token && !self.is_expired(),
        }
    }

    fn role(&self) -> String {
        self.read().record.role.clone()
    }

    fn has_role(&self, roles: &[&str]) -> bool {
        if roles.is_empty() {
            return true;
        }
        let state = self.read();
        roles.iter().any(|role| *role == state.record.role)
    }

    fn has_permission(&self, name: &str) -> bool {
        self.read().record.permissions.contains(name)
    }
}

fn read_key(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value.filter(|value| !value.is_empty()),
        Err(e) => {
            tracing::warn!("failed to read {}: {}", key, e);
            None
        }
    }
}

fn remove_keys(store: &dyn KeyValueStore, keys: &[&str]) {
    for key in keys {
        if let Err(e) = store.remove(key) {
            tracing::warn!("failed to remove {}: {}", key, e);
        }
    }
}

/// Reads the payload of a JWT without checking its signature. The result
/// is a hint for scheduling and UI only; anything unreadable is `None`.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let payload = jsonwebtoken::decode::<Value>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()?
        .claims;
    let number = |field: &str| {
        payload
            .get(field)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.floor() as i64)))
    };
    let permissions = payload
        .get("permissions")
        .or_else(|| payload.get("perms"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect::<Vec<_>>()
        });

    Some(TokenClaims {
        exp: number("exp"),
        iat: number("iat"),
        sub: payload.get("sub").and_then(Value::as_str).map(str::to_owned),
        role: payload.get("role").and_then(Value::as_str).map(str::to_owned),
        permissions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_local::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    fn jwt(claims: Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_unix(&self) -> i64 {
            self.0
        }
    }

    struct Fixture {
        tab: Arc<MemoryStore>,
        durable: Arc<MemoryStore>,
        channel: Arc<BroadcastSessionChannel>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tab: Arc::new(MemoryStore::new()),
                durable: Arc::new(MemoryStore::new()),
                channel: Arc::new(BroadcastSessionChannel::new()),
            }
        }

        fn store(&self, now: i64, config: SessionStoreConfig) -> SessionStore {
            SessionStore::new(
                config,
                self.tab.clone(),
                self.durable.clone(),
                self.channel.clone(),
                Arc::new(FixedClock(now)),
            )
        }
    }

    #[test]
    fn decodes_claims_without_verifying() {
        let token = jwt(json!({"exp": 2000, "iat": 1000, "sub": "u1", "role": "admin", "permissions": ["a", "b"]}));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.exp, Some(2000));
        assert_eq!(claims.role.as_deref(), Some("admin"));
        assert_eq!(claims.permissions, Some(vec!["a".to_owned(), "b".to_owned()]));
    }

    #[test]
    fn malformed_token_is_opaque() {
        assert!(decode_claims("not-a-jwt").is_none());
        assert!(decode_claims("a.b.c").is_none());

        let fixture = Fixture::new();
        let store = fixture.store(1000, SessionStoreConfig::default());
        store.set_credentials("opaque-token", None, None);
        assert!(store.is_authenticated());
        assert_eq!(store.seconds_to_expiry(), None);
        assert_eq!(store.snapshot().claims_source, ClaimsSource::None);
    }

    #[test]
    fn expiry_boundary_honours_skew() {
        let fixture = Fixture::new();
        let token = jwt(json!({"exp": 1000}));

        let before = fixture.store(969, SessionStoreConfig::default());
        before.set_credentials(&token, None, None);
        assert!(before.is_authenticated());

        let at = fixture.store(970, SessionStoreConfig::default());
        at.set_credentials(&token, None, None);
        assert!(!at.is_authenticated());
    }

    #[test]
    fn token_claims_are_marked_as_hints() {
        let fixture = Fixture::new();
        let store = fixture.store(0, SessionStoreConfig::default());
        store.set_credentials(&jwt(json!({"role": "seller", "perms": ["orders:read"]})), None, None);

        assert!(store.has_role(&["admin", "seller"]));
        assert!(!store.has_role(&["admin"]));
        assert!(store.has_permission("orders:read"));
        assert_eq!(store.snapshot().claims_source, ClaimsSource::TokenHint);

        store.set_role("admin");
        assert_eq!(store.snapshot().claims_source, ClaimsSource::Server);
    }

    #[test]
    fn token_hints_do_not_outlive_their_token() {
        let fixture = Fixture::new();
        let store = fixture.store(0, SessionStoreConfig::default());
        store.set_credentials(&jwt(json!({"role": "admin", "perms": ["orders:write"]})), None, None);
        assert!(store.has_role(&["admin"]));

        store.set_credentials(&jwt(json!({"sub": "u1"})), None, None);

        assert!(!store.has_role(&["admin"]));
        assert!(store.has_role(&[GUEST_ROLE]));
        assert!(!store.has_permission("orders:write"));
        assert_eq!(store.snapshot().claims_source, ClaimsSource::None);
    }

    #[test]
    fn server_role_survives_token_rotation() {
        let fixture = Fixture::new();
        let store = fixture.store(0, SessionStoreConfig::default());
        store.set_credentials(&jwt(json!({"role": "seller"})), None, None);
        store.set_role("admin");

        store.set_credentials(&jwt(json!({"sub": "u1"})), None, None);

        assert!(store.has_role(&["admin"]));
        assert_eq!(store.snapshot().claims_source, ClaimsSource::Server);
    }

    #[test]
    fn missing_refresh_token_keeps_current() {
        let fixture = Fixture::new();
        let store = fixture.store(0, SessionStoreConfig::default());
        store.set_credentials("a1", Some("r1"), None);
        store.set_credentials("a2", None, None);
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
        assert_eq!(store.access_token().as_deref(), Some("a2"));
    }

    #[test]
    fn ephemeral_tier_persists_nothing() {
        let fixture = Fixture::new();
        let store = fixture.store(0, SessionStoreConfig::default());
        store.set_credentials("a", Some("r"), None);
        assert!(fixture.tab.is_empty());
        assert!(fixture.durable.is_empty());
    }

    #[test]
    fn tier_switch_migrates_and_wipes_previous() {
        let fixture = Fixture::new();
        let store = fixture.store(0, SessionStoreConfig::default());
        store.set_credentials("a", Some("r"), Some(PersistTier::TabScoped));
        assert_eq!(fixture.tab.get(KEY_ACCESS).unwrap().as_deref(), Some("a"));

        store.set_persist_tier(PersistTier::Durable);
        assert_eq!(fixture.tab.get(KEY_ACCESS).unwrap(), None);
        assert_eq!(fixture.tab.get(KEY_PERSIST).unwrap(), None);
        assert_eq!(fixture.durable.get(KEY_ACCESS).unwrap().as_deref(), Some("a"));
        assert_eq!(fixture.durable.get(KEY_REFRESH).unwrap().as_deref(), Some("r"));
        assert_eq!(
            fixture.durable.get(KEY_PERSIST).unwrap().as_deref(),
            Some("durable")
        );
    }

    #[test]
    fn restores_from_last_selected_tier() {
        let fixture = Fixture::new();
        let token = jwt(json!({"exp": 5000, "role": "seller"}));
        let first = fixture.store(0, SessionStoreConfig::default());
        first.set_credentials(&token, Some("r"), Some(PersistTier::Durable));
        first.set_permissions(["orders:write"]);

        let second = fixture.store(100, SessionStoreConfig::default());
        assert_eq!(second.persist_tier(), PersistTier::Durable);
        assert_eq!(second.access_token(), Some(token));
        assert_eq!(second.seconds_to_expiry(), Some(4900));
        assert!(second.has_role(&["seller"]));
        assert!(second.has_permission("orders:write"));
        assert_eq!(*second.subscribe_expiry().borrow(), Some(5000));
    }

    #[test]
    fn clear_wipes_both_tiers_and_broadcasts_logout() {
        let fixture = Fixture::new();
        let mut rx = fixture.channel.subscribe();
        let store = fixture.store(0, SessionStoreConfig::default());
        store.set_credentials("a", Some("r"), Some(PersistTier::Durable));
        fixture.tab.set(KEY_ACCESS, "stray").unwrap();

        store.clear();
        assert_eq!(store.access_token(), None);
        assert_eq!(store.role(), GUEST_ROLE);
        assert_eq!(fixture.tab.get(KEY_ACCESS).unwrap(), None);
        assert_eq!(fixture.durable.get(KEY_ACCESS).unwrap(), None);
        assert_eq!(*store.subscribe_expiry().borrow(), None);

        let mut events = Vec::new();
        while let Ok(message) = rx.try_recv() {
            assert_eq!(&message.origin, store.origin());
            events.push(message.event);
        }
        assert_eq!(events.last(), Some(&SessionEvent::LoggedOut));
    }

    #[test]
    fn cookie_mode_authenticates_by_role_and_never_arms_refresh() {
        let fixture = Fixture::new();
        let store = fixture.store(
            0,
            SessionStoreConfig {
                auth_mode: AuthMode::Cookie,
                ..Default::default()
            },
        );
        assert!(!store.is_authenticated());
        store.set_credentials(&jwt(json!({"exp": 3600})), None, None);
        assert_eq!(*store.subscribe_expiry().borrow(), None);
        assert!(!store.is_authenticated());

        store.apply_identity(&Identity {
            role: Some("buyer".to_owned()),
            ..Default::default()
        });
        assert!(store.is_authenticated());
    }

    #[test]
    fn reload_without_marker_keeps_local_state() {
        let fixture = Fixture::new();
        let store = fixture.store(0, SessionStoreConfig::default());
        store.set_credentials("local", None, None);
        store.reload_from_storage();
        assert_eq!(store.access_token().as_deref(), Some("local"));
    }
}
