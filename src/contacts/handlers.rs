use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{field, info, instrument, Span};
use uuid::Uuid;

use super::{
    dto::{BirthdayParams, BirthdayResponse, ContactPayload, ContactResponse, Pagination, SearchParams},
    repo::ContactStore,
    repo_types::Page,
    services,
};
use crate::{auth::extractors::AuthUser, error::AppError, state::AppState};

// --- public router ---

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route("/contacts/search", get(search_contacts))
        .route("/contacts/birthdays", get(upcoming_birthdays))
        .route(
            "/contacts/:id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}

// --- handlers ---

fn contact_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    let Path(id) = path?;
    Span::current().record("contact_id", field::display(id));
    Ok(id)
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_contact(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<ContactPayload>, JsonRejection>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<ContactResponse>), AppError> {
    state.limits.create.enforce(user.id)?;
    let Json(payload) = payload?;
    let input = payload.into_input(state.clock.now().date())?;

    let contact = state.contacts.create(user.id, input).await?;
    info!(contact_id = %contact.id, "contact created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/v1/contacts/{}", contact.id))],
        Json(contact.into()),
    ))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_contacts(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    query: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<Vec<ContactResponse>>, AppError> {
    state.limits.general.enforce(user.id)?;
    let Query(p) = query?;
    let contacts = state.contacts.list_for_owner(user.id, p.into_page()?).await?;
    Ok(Json(contacts.into_iter().map(Into::into).collect()))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn search_contacts(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<ContactResponse>>, AppError> {
    state.limits.search.enforce(user.id)?;
    let Query(params) = query?;
    let query = params.into_search()?;
    let contacts = state.contacts.search(&query, Some(user.id)).await?;
    Ok(Json(contacts.into_iter().map(Into::into).collect()))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn upcoming_birthdays(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    query: Result<Query<BirthdayParams>, QueryRejection>,
) -> Result<Json<Vec<BirthdayResponse>>, AppError> {
    state.limits.general.enforce(user.id)?;
    let Query(params) = query?;
    if !(0..=366).contains(&params.days) {
        return Err(AppError::Validation("days must be between 0 and 366".into()));
    }
    let today = state.clock.now().date();
    let contacts = state.contacts.list_for_owner(user.id, Page::ALL).await?;
    let upcoming = services::upcoming_birthdays(contacts, today, params.days);
    Ok(Json(upcoming.into_iter().map(Into::into).collect()))
}

#[instrument(skip_all, fields(user_id = %user.id, contact_id = field::Empty))]
pub async fn get_contact(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ContactResponse>, AppError> {
    state.limits.general.enforce(user.id)?;
    let id = contact_id(path)?;
    let contact = services::get_owned(state.contacts.as_ref(), user.id, id).await?;
    Ok(Json(contact.into()))
}

#[instrument(skip_all, fields(user_id = %user.id, contact_id = field::Empty))]
pub async fn update_contact(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ContactPayload>, JsonRejection>,
) -> Result<Json<ContactResponse>, AppError> {
    state.limits.general.enforce(user.id)?;
    let id = contact_id(path)?;
    let Json(payload) = payload?;
    let input = payload.into_input(state.clock.now().date())?;
    let contact = services::update_owned(state.contacts.as_ref(), user.id, id, input).await?;
    info!("contact updated");
    Ok(Json(contact.into()))
}

#[instrument(skip_all, fields(user_id = %user.id, contact_id = field::Empty))]
pub async fn delete_contact(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    state.limits.general.enforce(user.id)?;
    let id = contact_id(path)?;
    services::delete_owned(state.contacts.as_ref(), user.id, id).await?;
    info!("contact deleted");
    Ok(StatusCode::NO_CONTENT)
}
