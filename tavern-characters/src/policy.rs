//! Role and ownership gating for every read and write path.

use crate::error::{CharacterError, Result};
use crate::types::{Ownership, RecordRole};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Access-control identity of the acting user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Gm,
    Player,
}

impl ActorRole {
    /// Value stored in the `users.role` column
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gm => "gm",
            Self::Player => "user",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gm => f.write_str("GM"),
            Self::Player => f.write_str("Player"),
        }
    }
}

impl FromStr for ActorRole {
    type Err = CharacterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gm" => Ok(Self::Gm),
            "user" | "player" => Ok(Self::Player),
            other => Err(CharacterError::validation(
                "role",
                format!("'{other}' is not a user role (expected gm or user)"),
            )),
        }
    }
}

/// The user an operation is performed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: ActorRole,
}

impl Actor {
    pub fn gm(user_id: i64) -> Self {
        Self {
            user_id,
            role: ActorRole::Gm,
        }
    }

    pub fn player(user_id: i64) -> Self {
        Self {
            user_id,
            role: ActorRole::Player,
        }
    }

    pub fn is_gm(&self) -> bool {
        self.role == ActorRole::Gm
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Outcome of a policy check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Resolves a user id to an actor role.
///
/// This is the whole surface the core needs from authentication.
pub trait RoleLookup: Send + Sync {
    fn get_role(&self, user_id: i64) -> Result<ActorRole>;
}

/// Fixed in-memory role table
#[derive(Debug, Clone, Default)]
pub struct StaticRoles {
    roles: HashMap<i64, ActorRole>,
}

impl StaticRoles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, user_id: i64, role: ActorRole) -> Self {
        self.roles.insert(user_id, role);
        self
    }
}

impl RoleLookup for StaticRoles {
    fn get_role(&self, user_id: i64) -> Result<ActorRole> {
        self.roles
            .get(&user_id)
            .copied()
            .ok_or_else(|| CharacterError::NotFound {
                resource: "user".into(),
                id: user_id.to_string(),
            })
    }
}

/// Decides what an actor may see and change.
///
/// GMs may do anything. Players see Character records only, never NPCs,
/// and may change a Character only when they own it.
#[derive(Clone)]
pub struct AccessPolicy {
    roles: Arc<dyn RoleLookup>,
}

impl AccessPolicy {
    pub fn new(roles: Arc<dyn RoleLookup>) -> Self {
        Self { roles }
    }

    /// Build the actor for a user id from its stored role
    pub fn actor(&self, user_id: i64) -> Result<Actor> {
        Ok(Actor {
            user_id,
            role: self.roles.get_role(user_id)?,
        })
    }

    /// Check one action on one record. For `Create`, `record` describes
    /// the record about to be created.
    pub fn check(&self, actor: &Actor, record: &Ownership, action: Action) -> Decision {
        if actor.is_gm() {
            return Decision::Allowed;
        }
        match (record.role, action) {
            (RecordRole::Npc, Action::View) => {
                Decision::Denied("NPC records are visible to the GM only".into())
            }
            (RecordRole::Npc, _) => {
                Decision::Denied(format!("only the GM may {action} NPC records"))
            }
            (RecordRole::Character, Action::View) => Decision::Allowed,
            (RecordRole::Character, _) if record.owner_user_id == Some(actor.user_id) => {
                Decision::Allowed
            }
            (RecordRole::Character, Action::Create) => {
                Decision::Denied("players may only create characters they own".into())
            }
            (RecordRole::Character, _) => Decision::Denied(format!(
                "only the GM or the owning player may {action} this character"
            )),
        }
    }

    /// [`check`](Self::check) as a `Result`
    pub fn enforce(&self, actor: &Actor, record: &Ownership, action: Action) -> Result<()> {
        match self.check(actor, record, action) {
            Decision::Allowed => Ok(()),
            Decision::Denied(reason) => {
                warn!(
                    "denied {action} for user {} ({}): {reason}",
                    actor.user_id, actor.role
                );
                Err(CharacterError::denied(reason))
            }
        }
    }

    pub fn visible(&self, actor: &Actor, record: &Ownership) -> bool {
        self.check(actor, record, Action::View).is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn policy() -> AccessPolicy {
        AccessPolicy::new(Arc::new(
            StaticRoles::new()
                .with(1, ActorRole::Gm)
                .with(7, ActorRole::Player)
                .with(8, ActorRole::Player),
        ))
    }

    fn npc() -> Ownership {
        Ownership {
            role: RecordRole::Npc,
            owner_user_id: Some(1),
        }
    }

    fn character_of(owner: i64) -> Ownership {
        Ownership {
            role: RecordRole::Character,
            owner_user_id: Some(owner),
        }
    }

    #[test]
    fn test_npc_view() {
        let policy = policy();
        assert!(matches!(
            policy.check(&Actor::player(7), &npc(), Action::View),
            Decision::Denied(_)
        ));
        assert_eq!(
            policy.check(&Actor::gm(1), &npc(), Action::View),
            Decision::Allowed
        );
    }

    #[rstest]
    #[case(Action::Create)]
    #[case(Action::Update)]
    #[case(Action::Delete)]
    fn test_npc_mutation_is_gm_only(#[case] action: Action) {
        let policy = policy();
        let owned_npc = Ownership {
            role: RecordRole::Npc,
            owner_user_id: Some(7),
        };
        assert!(!policy.check(&Actor::player(7), &owned_npc, action).is_allowed());
        assert!(policy.check(&Actor::gm(1), &owned_npc, action).is_allowed());
    }

    #[rstest]
    #[case(Action::Create)]
    #[case(Action::Update)]
    #[case(Action::Delete)]
    fn test_character_mutation_needs_owner(#[case] action: Action) {
        let policy = policy();
        assert!(policy.check(&Actor::player(7), &character_of(7), action).is_allowed());
        assert!(!policy.check(&Actor::player(8), &character_of(7), action).is_allowed());
        assert!(policy.check(&Actor::gm(1), &character_of(7), action).is_allowed());
    }

    #[test]
    fn test_players_see_every_character() {
        let policy = policy();
        assert!(policy.visible(&Actor::player(8), &character_of(7)));
        let orphan = Ownership {
            role: RecordRole::Character,
            owner_user_id: None,
        };
        assert!(policy.visible(&Actor::player(8), &orphan));
        assert!(!policy
            .check(&Actor::player(8), &orphan, Action::Update)
            .is_allowed());
    }

    #[test]
    fn test_enforce_maps_to_permission_denied() {
        let err = policy()
            .enforce(&Actor::player(8), &character_of(7), Action::Delete)
            .unwrap_err();
        assert!(matches!(err, CharacterError::PermissionDenied { .. }));
    }

    #[test]
    fn test_actor_from_lookup() {
        let policy = policy();
        assert_eq!(policy.actor(1).unwrap(), Actor::gm(1));
        assert_eq!(policy.actor(7).unwrap(), Actor::player(7));
        assert!(matches!(
            policy.actor(99),
            Err(CharacterError::NotFound { .. })
        ));
    }

    #[rstest]
    #[case("gm", ActorRole::Gm)]
    #[case("GM", ActorRole::Gm)]
    #[case("user", ActorRole::Player)]
    #[case("player", ActorRole::Player)]
    fn test_actor_role_parse(#[case] input: &str, #[case] expected: ActorRole) {
        assert_eq!(input.parse::<ActorRole>().unwrap(), expected);
    }
}
