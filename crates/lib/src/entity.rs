//! Boards, lists and cards, and the ordering scopes they live in.
//!
//! Lists are ranked inside a board and cards are ranked inside a list. A
//! [`Scope`] names one such ordered collection by its parent; an [`Entity`] is
//! a ranked member of some scope.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Timestamp;
use crate::rank::Rank;

/// Board identifier.
pub type BoardId = Uuid;
/// List identifier.
pub type ListId = Uuid;
/// Card identifier.
pub type CardId = Uuid;
/// Identifier of the acting user. Authentication happens outside this crate.
pub type UserId = Uuid;

/// Kind of a ranked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    List,
    Card,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::List => f.write_str("list"),
            EntityKind::Card => f.write_str("card"),
        }
    }
}

/// An ordering scope, keyed by its parent.
///
/// Ranks are only comparable between members of the same scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Scope {
    /// The lists of a board.
    Board(BoardId),
    /// The cards of a list.
    List(ListId),
}

impl Scope {
    /// Kind of entity ordered by this scope.
    pub fn member_kind(&self) -> EntityKind {
        match self {
            Scope::Board(_) => EntityKind::List,
            Scope::List(_) => EntityKind::Card,
        }
    }

    /// Id of the parent row that owns this scope.
    pub fn parent_id(&self) -> Uuid {
        match self {
            Scope::Board(id) | Scope::List(id) => *id,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Board(id) => write!(f, "board:{id}"),
            Scope::List(id) => write!(f, "list:{id}"),
        }
    }
}

/// A board. Owns an ordered set of lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    pub created_by: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i64,
}

/// A list on a board. Ranked within its board; owns an ordered set of cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: ListId,
    pub board_id: BoardId,
    pub title: String,
    pub rank: Rank,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i64,
}

/// A card. Ranked within its list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub board_id: BoardId,
    pub list_id: ListId,
    pub title: String,
    pub description: String,
    pub status: String,
    pub rank: Rank,
    pub created_by: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i64,
}

/// Status given to newly created cards.
pub const DEFAULT_CARD_STATUS: &str = "active";

/// Lists every new board starts with, in display order.
pub const DEFAULT_LIST_TITLES: [&str; 3] = ["To Do", "Doing", "Done"];

/// Editable card fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CardUpdate {
    /// Copy the set fields onto `card`.
    pub(crate) fn apply_to(&self, card: &mut Card) {
        if let Some(title) = &self.title {
            card.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            card.description.clone_from(description);
        }
    }
}

/// Fields supplied when creating a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    pub created_by: UserId,
}

impl NewCard {
    pub fn new(title: impl Into<String>, created_by: UserId) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status: None,
            created_by,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A ranked member of some scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    List(List),
    Card(Card),
}

impl Entity {
    pub fn id(&self) -> Uuid {
        match self {
            Entity::List(list) => list.id,
            Entity::Card(card) => card.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::List(_) => EntityKind::List,
            Entity::Card(_) => EntityKind::Card,
        }
    }

    pub fn rank(&self) -> Rank {
        match self {
            Entity::List(list) => list.rank,
            Entity::Card(card) => card.rank,
        }
    }

    /// The scope this entity is currently ranked in.
    pub fn scope(&self) -> Scope {
        match self {
            Entity::List(list) => Scope::Board(list.board_id),
            Entity::Card(card) => Scope::List(card.list_id),
        }
    }

    pub fn board_id(&self) -> BoardId {
        match self {
            Entity::List(list) => list.board_id,
            Entity::Card(card) => card.board_id,
        }
    }

    pub fn version(&self) -> i64 {
        match self {
            Entity::List(list) => list.version,
            Entity::Card(card) => card.version,
        }
    }

    pub fn created_at(&self) -> Timestamp {
        match self {
            Entity::List(list) => list.created_at,
            Entity::Card(card) => card.created_at,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Entity::List(list) => Some(list),
            Entity::Card(_) => None,
        }
    }

    pub fn as_card(&self) -> Option<&Card> {
        match self {
            Entity::Card(card) => Some(card),
            Entity::List(_) => None,
        }
    }

    pub fn into_list(self) -> Option<List> {
        match self {
            Entity::List(list) => Some(list),
            Entity::Card(_) => None,
        }
    }

    pub fn into_card(self) -> Option<Card> {
        match self {
            Entity::Card(card) => Some(card),
            Entity::List(_) => None,
        }
    }
}

impl From<List> for Entity {
    fn from(list: List) -> Self {
        Entity::List(list)
    }
}

impl From<Card> for Entity {
    fn from(card: Card) -> Self {
        Entity::Card(card)
    }
}

/// Sort siblings the way every backend returns them: rank ascending, then
/// creation time, then id.
pub fn sort_by_rank(entities: &mut [Entity]) {
    entities.sort_by(|a, b| {
        a.rank()
            .cmp(&b.rank())
            .then(a.created_at().cmp(&b.created_at()))
            .then(a.id().cmp(&b.id()))
    });
}
