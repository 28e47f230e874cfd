//! !api 3.0.3
//! !info "Swagger Petstore" v1.0.0 "A sample pet store server"
//! !contact "API Support" <support@petstore.io> (https://petstore.io/support)
//! !license MIT https://opensource.org/licenses/MIT
//! !server https://petstore.io/v1 "Production"
//! !server http://localhost:8080 "Local"
//! !tag pets "Everything about your pets"
//! !tag store "Access to petstore orders"
//! !security petstore_auth:oauth2 "OAuth2 implicit flow" https://petstore.io/oauth/authorize
//! !security api_key:apiKey:header "API key"
//! !scope petstore_auth write:pets "modify pets in your account"
//! !scope petstore_auth read:pets "read your pets"

use axum::{extract::Path, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

/// A pet for sale in the pet store.
/// !model "A pet for sale"
/// !field id:int64 "Unique identifier" required
#[derive(Debug, Serialize, Deserialize)]
pub struct Pet {
    pub id: i64,
    /// !field name:string "Pet name" required example="doggie"
    pub name: String,
    /// !field status:string "Store status" enum=available,pending,sold default=available
    pub status: String,
    /// !field tags:string[]? "Free-form labels"
    pub tags: Option<Vec<String>>,
}

/// !model "An order for pets"
#[derive(Debug, Serialize, Deserialize)]
pub struct Order {
    /// !field id:int64 required
    pub id: i64,
    /// !field petId:int64 required
    pub pet_id: i64,
    /// !field quantity:int32 minimum=1 default=1
    pub quantity: i32,
}

/// !model "Error payload"
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// !field code:int32 required
    pub code: i32,
    /// !field message:string required
    pub message: String,
}

/// Lists pets.
///
/// !GET /pets -> listPets "List all pets" #pets
/// !query limit:int32 "How many items to return" default=20
/// !query status:string|null "Filter by status"
/// !ok Pet[] "A page of pets"
/// !error ApiError "Unexpected error"
async fn list_pets() -> Json<Vec<Pet>> {
    Json(vec![])
}

/// !POST /pets -> createPet "Create a pet" #pets
/// !body Pet "Pet to add" required
/// !ok 201 Pet "Created"
/// !error 400 ApiError "Invalid input"
/// !secure petstore_auth
async fn create_pet(Json(pet): Json<Pet>) -> Json<Pet> {
    Json(pet)
}

/// !GET /pets/:id -> getPet "Find pet by ID" #pets
/// !path id:int64 "ID of pet to return" required
/// !ok Pet "The pet"
/// !error 404 ApiError "Pet not found"
/// !secure api_key
async fn get_pet(Path(id): Path<i64>) -> Json<Pet> {
    Json(Pet {
        id,
        name: String::new(),
        status: String::new(),
        tags: None,
    })
}

/// !DELETE /pets/{id} -> deletePet "Delete a pet" #pets
/// !ok 204 - "Deleted"
/// !secure petstore_auth
async fn delete_pet() {}

/// !POST /store/orders -> placeOrder "Place an order" #store
/// !body Order required
/// !ok Order "Order placed"
async fn place_order(Json(order): Json<Order>) -> Json<Order> {
    Json(order)
}

pub fn app() -> Router {
    Router::new()
        .route("/pets", get(list_pets).post(create_pet))
        .route("/pets/:id", get(get_pet).delete(delete_pet))
}
