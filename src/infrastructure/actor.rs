use crate::domain::ports::ActorResolver;

/// Environment variable naming the acting user for [`EnvActor`].
pub const ACTOR_ENV: &str = "CHANGE_INTAKE_ACTOR";

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A fixed identity, typically resolved by the caller's auth layer and
/// passed in per request.
#[derive(Debug, Clone, Default)]
pub struct StaticActor(Option<String>);

impl StaticActor {
    pub fn new(login: impl Into<String>) -> Self {
        Self(Some(login.into()))
    }

    /// No authenticated actor; the service falls back to its system identity.
    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl ActorResolver for StaticActor {
    fn current_actor(&self) -> Option<String> {
        self.0.clone().and_then(non_blank)
    }
}

/// Reads `CHANGE_INTAKE_ACTOR`, then `USER`. Used by the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvActor;

impl ActorResolver for EnvActor {
    fn current_actor(&self) -> Option<String> {
        std::env::var(ACTOR_ENV)
            .ok()
            .and_then(non_blank)
            .or_else(|| std::env::var("USER").ok().and_then(non_blank))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_actor() {
        assert_eq!(StaticActor::new(" alice ").current_actor(), Some("alice".into()));
        assert_eq!(StaticActor::new("  ").current_actor(), None);
        assert_eq!(StaticActor::anonymous().current_actor(), None);
    }
}
