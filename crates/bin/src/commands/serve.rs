//! Serve command - runs the kanban-rank HTTP server.

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{SignalKind, signal};
use uuid::Uuid;

use kanban_rank::{
    Authorizer, Backend, Board, BoardAccess, Card, CardUpdate, Entity, List, MoveOutcome, NewCard,
    Placement, Rank, Reorderer, Scope,
    backend::database::{DbKind, InMemory, SqlxBackend},
    clock::to_rfc3339,
    entity::{BoardId, CardId, ListId, UserId},
};

use crate::backend::{create_backend, data_dir, snapshot_path};
use crate::cli::ServeArgs;

/// Header carrying the acting user's id
const USER_HEADER: &str = "x-user-id";

/// Shared application state
#[derive(Clone)]
struct AppState {
    reorderer: Reorderer<BoardAccess>,
}

impl AppState {
    fn backend(&self) -> &Backend {
        self.reorderer.backend()
    }

    async fn authorize(&self, actor: &UserId, board_id: &BoardId) -> Result<(), ApiError> {
        Ok(self.reorderer.authorizer().authorize(actor, board_id).await?)
    }

    /// Reject a request whose `boardId` does not own `list_id`. Callers
    /// authorize on `board_id` first so outsiders cannot test which list ids exist.
    async fn check_list_board(&self, list_id: ListId, board_id: BoardId) -> Result<(), ApiError> {
        let owner = self.reorderer.scope_board(&Scope::List(list_id)).await?;
        if owner != board_id {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("list {list_id} does not belong to board {board_id}"),
            ));
        }
        Ok(())
    }
}

/// Run the kanban-rank server
pub async fn run(args: &ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let backend = Backend::from(create_backend(args).await?);
    let state = AppState {
        reorderer: Reorderer::new(backend.clone(), BoardAccess::new(backend.clone())),
    };
    let app = router(state);

    // Bind server
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    // Set up signal handlers before accepting connections
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    println!(
        "kanban-rank server listening on http://localhost:{}",
        local_addr.port()
    );
    println!();
    println!("Available endpoints:");
    println!("  GET    /health              - Health check");
    println!("  GET    /boards              - Boards of the caller, recently updated first");
    println!("  POST   /boards              - Create a board with default lists");
    println!("  GET    /boards/{{id}}         - Board with lists and cards in order");
    println!("  PATCH  /boards/{{id}}         - Rename a board");
    println!("  DELETE /boards/{{id}}         - Delete a board (owner only)");
    println!("  POST   /boards/{{id}}/members - Add a board member");
    println!("  POST   /lists               - Create a list");
    println!("  PATCH  /lists/{{id}}          - Rename a list");
    println!("  PATCH  /lists/{{id}}/move     - Move a list");
    println!("  DELETE /lists/{{id}}          - Delete a list and its cards");
    println!("  POST   /cards               - Create a card");
    println!("  PATCH  /cards/{{id}}          - Edit a card's title or description");
    println!("  PATCH  /cards/{{id}}/move     - Move a card");
    println!("  DELETE /cards/{{id}}          - Delete a card");
    println!();
    println!("Press Ctrl+C to shutdown");

    let snapshot = snapshot_path(&data_dir(args));

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown..."),
                _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown..."),
            }

            // Save database on shutdown (only needed for InMemory backend)
            if let Some(in_memory_backend) = backend.backend_impl().as_any().downcast_ref::<InMemory>()
            {
                match in_memory_backend.save_to_file(&snapshot).await {
                    Ok(_) => {
                        tracing::info!("Database saved to {}", snapshot.display());
                        println!("\nDatabase saved successfully");
                    }
                    Err(e) => {
                        tracing::error!("Failed to save database: {e:?}");
                        eprintln!("Failed to save database: {e:?}");
                    }
                }
            }
        })
        .await?;

    println!("Server shut down");
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/boards", get(handle_list_boards).post(handle_create_board))
        .route(
            "/boards/{id}",
            get(handle_get_board)
                .patch(handle_rename_board)
                .delete(handle_delete_board),
        )
        .route("/boards/{id}/members", post(handle_add_member))
        .route("/lists", post(handle_create_list))
        .route("/lists/{id}/move", patch(handle_move_list))
        .route("/lists/{id}", patch(handle_update_list).delete(handle_delete_list))
        .route("/cards", post(handle_create_card))
        .route("/cards/{id}/move", patch(handle_move_card))
        .route("/cards/{id}", patch(handle_update_card).delete(handle_delete_card))
        .with_state(state)
}

// ============================================================================
// Errors and extractors
// ============================================================================

/// JSON error response
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<kanban_rank::Error> for ApiError {
    fn from(err: kanban_rank::Error) -> Self {
        let status = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else if err.is_access_denied() {
            StatusCode::FORBIDDEN
        } else if err.is_invalid_target() {
            StatusCode::BAD_REQUEST
        } else if err.is_conflict() {
            StatusCode::CONFLICT
        } else {
            tracing::error!(module = err.module(), "Request failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// The acting user, taken from the `x-user-id` header
struct Actor(UserId);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::new(StatusCode::UNAUTHORIZED, format!("missing {USER_HEADER} header"))
            })?;
        Uuid::parse_str(value).map(Actor).map_err(|_| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                format!("{USER_HEADER} is not a valid UUID"),
            )
        })
    }
}

// ============================================================================
// Request and response bodies
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
}

#[derive(Deserialize)]
struct CreateBoardRequest {
    name: String,
}

#[derive(Deserialize)]
struct RenameBoardRequest {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMemberRequest {
    user_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateListRequest {
    board_id: BoardId,
    title: String,
    before_list_id: Option<Uuid>,
    after_list_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct UpdateListRequest {
    title: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveListRequest {
    board_id: BoardId,
    rank: Option<Rank>,
    before_list_id: Option<Uuid>,
    after_list_id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCardRequest {
    board_id: BoardId,
    list_id: ListId,
    title: String,
    #[serde(default)]
    description: String,
    before_card_id: Option<Uuid>,
    after_card_id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveCardRequest {
    board_id: BoardId,
    list_id: ListId,
    rank: Option<Rank>,
    before_card_id: Option<Uuid>,
    after_card_id: Option<Uuid>,
}

// Views mirror the stored rows but render timestamps as RFC3339 strings.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BoardView {
    id: BoardId,
    name: String,
    created_by: UserId,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl From<Board> for BoardView {
    fn from(board: Board) -> Self {
        Self {
            id: board.id,
            name: board.name,
            created_by: board.created_by,
            created_at: to_rfc3339(board.created_at),
            updated_at: to_rfc3339(board.updated_at),
            version: board.version,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListView {
    id: ListId,
    board_id: BoardId,
    title: String,
    rank: Rank,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl From<List> for ListView {
    fn from(list: List) -> Self {
        Self {
            id: list.id,
            board_id: list.board_id,
            title: list.title,
            rank: list.rank,
            created_at: to_rfc3339(list.created_at),
            updated_at: to_rfc3339(list.updated_at),
            version: list.version,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CardView {
    id: CardId,
    board_id: BoardId,
    list_id: ListId,
    title: String,
    description: String,
    status: String,
    rank: Rank,
    created_by: UserId,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl From<Card> for CardView {
    fn from(card: Card) -> Self {
        Self {
            id: card.id,
            board_id: card.board_id,
            list_id: card.list_id,
            title: card.title,
            description: card.description,
            status: card.status,
            rank: card.rank,
            created_by: card.created_by,
            created_at: to_rfc3339(card.created_at),
            updated_at: to_rfc3339(card.updated_at),
            version: card.version,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum EntityView {
    List(ListView),
    Card(CardView),
}

#[derive(Serialize)]
struct MoveView {
    entity: EntityView,
    rank: Rank,
    reindexed: bool,
}

impl From<MoveOutcome> for MoveView {
    fn from(outcome: MoveOutcome) -> Self {
        let entity = match outcome.entity {
            Entity::List(list) => EntityView::List(list.into()),
            Entity::Card(card) => EntityView::Card(card.into()),
        };
        Self {
            entity,
            rank: outcome.rank,
            reindexed: outcome.reindexed,
        }
    }
}

/// A list together with its cards in display order
#[derive(Serialize)]
struct ListWithCards {
    #[serde(flatten)]
    list: ListView,
    cards: Vec<CardView>,
}

#[derive(Serialize)]
struct BoardDetail {
    board: BoardView,
    lists: Vec<ListWithCards>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for GET /health
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend = state.backend().backend_impl();
    let backend_type = if let Some(sqlx) = backend.as_any().downcast_ref::<SqlxBackend>() {
        match sqlx.kind() {
            DbKind::Sqlite => "sqlite",
            DbKind::Postgres => "postgres",
        }
    } else if backend.as_any().is::<InMemory>() {
        "inmemory"
    } else {
        "unknown"
    };

    Json(HealthResponse {
        status: "healthy",
        backend: backend_type,
    })
}

/// Handler for GET /boards
async fn handle_list_boards(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> Result<Json<Vec<BoardView>>, ApiError> {
    let boards = state.backend().boards_for_user(&actor).await?;
    Ok(Json(boards.into_iter().map(BoardView::from).collect()))
}

/// Handler for POST /boards
async fn handle_create_board(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<CreateBoardRequest>,
) -> Result<(StatusCode, Json<BoardView>), ApiError> {
    let board = state.backend().create_board(&request.name, actor).await?;
    tracing::info!(board = %board.id, %actor, "Created board");
    Ok((StatusCode::CREATED, Json(board.into())))
}

/// Handler for GET /boards/{id}
async fn handle_get_board(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(board_id): Path<BoardId>,
) -> Result<Json<BoardDetail>, ApiError> {
    state.authorize(&actor, &board_id).await?;
    let backend = state.backend();
    let board = backend.get_board(&board_id).await?;

    let mut lists = Vec::new();
    for list in backend.lists_in_board(&board_id).await? {
        let cards = backend.cards_in_list(&list.id).await?;
        lists.push(ListWithCards {
            list: list.into(),
            cards: cards.into_iter().map(CardView::from).collect(),
        });
    }
    Ok(Json(BoardDetail {
        board: board.into(),
        lists,
    }))
}

/// Handler for PATCH /boards/{id}
async fn handle_rename_board(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(board_id): Path<BoardId>,
    Json(request): Json<RenameBoardRequest>,
) -> Result<Json<BoardView>, ApiError> {
    state.authorize(&actor, &board_id).await?;
    let board = state
        .backend()
        .rename_board(&board_id, &request.name)
        .await?;
    Ok(Json(board.into()))
}

/// Handler for DELETE /boards/{id}
async fn handle_delete_board(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(board_id): Path<BoardId>,
) -> Result<StatusCode, ApiError> {
    state
        .reorderer
        .authorizer()
        .authorize_owner(&actor, &board_id)
        .await?;
    state.backend().delete_board(&board_id).await?;
    tracing::info!(board = %board_id, %actor, "Deleted board");
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /boards/{id}/members
async fn handle_add_member(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(board_id): Path<BoardId>,
    Json(request): Json<AddMemberRequest>,
) -> Result<StatusCode, ApiError> {
    state.authorize(&actor, &board_id).await?;
    state
        .backend()
        .add_member(&board_id, &request.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /lists
async fn handle_create_list(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<CreateListRequest>,
) -> Result<(StatusCode, Json<MoveView>), ApiError> {
    let placement = Placement::between(request.before_list_id, request.after_list_id);
    let outcome = state
        .reorderer
        .create_list(&actor, request.board_id, &request.title, placement)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// Handler for PATCH /lists/{id}
async fn handle_update_list(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(list_id): Path<ListId>,
    Json(request): Json<UpdateListRequest>,
) -> Result<Json<ListView>, ApiError> {
    let list = state.backend().get_list(&list_id).await?;
    state.authorize(&actor, &list.board_id).await?;
    let list = state
        .backend()
        .update_list(&list_id, &request.title)
        .await?;
    Ok(Json(list.into()))
}

/// Handler for PATCH /lists/{id}/move
async fn handle_move_list(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(list_id): Path<ListId>,
    Json(request): Json<MoveListRequest>,
) -> Result<Json<MoveView>, ApiError> {
    let placement = Placement {
        rank: request.rank,
        before: request.before_list_id,
        after: request.after_list_id,
    };
    let outcome = state
        .reorderer
        .move_list(&actor, list_id, request.board_id, placement)
        .await?;
    Ok(Json(outcome.into()))
}

/// Handler for DELETE /lists/{id}
async fn handle_delete_list(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(list_id): Path<ListId>,
) -> Result<StatusCode, ApiError> {
    let list = state.backend().get_list(&list_id).await?;
    state.authorize(&actor, &list.board_id).await?;
    state.backend().delete_list(&list_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /cards
async fn handle_create_card(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<CreateCardRequest>,
) -> Result<(StatusCode, Json<MoveView>), ApiError> {
    state.authorize(&actor, &request.board_id).await?;
    state
        .check_list_board(request.list_id, request.board_id)
        .await?;
    let card = NewCard::new(request.title, actor).with_description(request.description);
    let placement = Placement::between(request.before_card_id, request.after_card_id);
    let outcome = state
        .reorderer
        .create_card(&actor, request.list_id, &card, placement)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// Handler for PATCH /cards/{id}
async fn handle_update_card(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(card_id): Path<CardId>,
    Json(update): Json<CardUpdate>,
) -> Result<Json<CardView>, ApiError> {
    let card = state.backend().get_card(&card_id).await?;
    state.authorize(&actor, &card.board_id).await?;
    let card = state.backend().update_card(&card_id, &update).await?;
    Ok(Json(card.into()))
}

/// Handler for PATCH /cards/{id}/move
async fn handle_move_card(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(card_id): Path<CardId>,
    Json(request): Json<MoveCardRequest>,
) -> Result<Json<MoveView>, ApiError> {
    state.authorize(&actor, &request.board_id).await?;
    state
        .check_list_board(request.list_id, request.board_id)
        .await?;
    let placement = Placement {
        rank: request.rank,
        before: request.before_card_id,
        after: request.after_card_id,
    };
    let outcome = state
        .reorderer
        .move_card(&actor, card_id, request.list_id, placement)
        .await?;
    Ok(Json(outcome.into()))
}

/// Handler for DELETE /cards/{id}
async fn handle_delete_card(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(card_id): Path<CardId>,
) -> Result<StatusCode, ApiError> {
    let card = state.backend().get_card(&card_id).await?;
    state.authorize(&actor, &card.board_id).await?;
    state.backend().delete_card(&card_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
