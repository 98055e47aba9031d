//! Storefront API client against a mocked remote API.

use std::time::Duration;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use serde_json::json;
use storefront::{
    auth::{Role, Session},
    client::StorefrontClient,
    errors::ServiceError,
    models::{
        cart::CartItemRequest, Cart, ClientRegistrationRequest, LoginRequest, ProductRequest,
    },
};
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn setup() -> (MockServer, StorefrontClient) {
    let server = MockServer::start().await;
    let client =
        StorefrontClient::new(&format!("{}/api", server.uri()), Duration::from_secs(5)).unwrap();
    (server, client)
}

fn user_session() -> Session {
    Session::new("user-token", Role::User, "user-1")
}

fn admin_session() -> Session {
    Session::new("admin-token", Role::Admin, "admin-1")
}

fn cart_json(id: &str, owner: &str) -> serde_json::Value {
    json!({
        "_id": id,
        "userId": owner,
        "products": [
            { "productId": { "_id": "p1", "name": "Mug", "price": 12.5 }, "quantity": 2 }
        ],
        "totalPrice": 25
    })
}

#[tokio::test]
async fn login_builds_session() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .and(body_json(json!({ "email": "admin@shop.example", "password": "secret1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "token": "abc", "role": "admin", "_id": "u-9" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client
        .login(&LoginRequest {
            email: "admin@shop.example".into(),
            password: "secret1".into(),
        })
        .await
        .unwrap();

    assert_eq!(session.token(), "abc");
    assert_eq!(session.role(), Role::Admin);
    assert_eq!(session.user_id(), "u-9");
}

#[tokio::test]
async fn invalid_credentials_never_leave_the_client() {
    let (server, client) = setup().await;

    let err = client
        .login(&LoginRequest {
            email: "nobody".into(),
            password: "123".into(),
        })
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unsuccessful_envelope_is_an_api_error() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Invalid password"
        })))
        .mount(&server)
        .await;

    let err = client
        .login(&LoginRequest {
            email: "user@shop.example".into(),
            password: "wrong-password".into(),
        })
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ExternalApiError(msg) if msg == "Invalid password");
}

#[tokio::test]
async fn error_status_carries_server_message() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/product/getAllProduct"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "message": "database unavailable"
        })))
        .mount(&server)
        .await;

    let err = client.list_products(&user_session()).await.unwrap_err();

    assert_matches!(err, ServiceError::ExternalApiError(msg) if msg == "500: database unavailable");
}

#[tokio::test]
async fn unreachable_server_is_a_service_error() {
    let client = StorefrontClient::new("http://127.0.0.1:1/api", Duration::from_secs(2)).unwrap();

    let err = client.client_subscriptions().await.unwrap_err();

    assert_matches!(err, ServiceError::ExternalServiceError(_));
}

#[tokio::test]
async fn admin_calls_are_refused_for_users_without_a_request() {
    let (server, client) = setup().await;
    let product = ProductRequest {
        name: "Mug".into(),
        price: dec!(12.50),
        description: "Stoneware".into(),
        category: "kitchen".into(),
        stock: 10,
        image: "https://cdn.example.com/mug.png".into(),
    };

    let err = client
        .create_product(&user_session(), &product)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let err = client
        .set_plan_active(&user_session(), "plan-1", false)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let err = client.list_carts(&admin_session()).await.unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn admin_requests_carry_bearer_token() {
    let (server, client) = setup().await;
    Mock::given(method("PUT"))
        .and(path("/api/subscription/deactivate/plan-7"))
        .and(header("authorization", "Bearer admin-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Subscription deactivated"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let message = client
        .set_plan_active(&admin_session(), "plan-7", false)
        .await
        .unwrap();
    assert_eq!(message.as_deref(), Some("Subscription deactivated"));
}

#[tokio::test]
async fn plan_listing_accepts_nested_data() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/subscription/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "data": [
                { "_id": "plan-1", "name": "Starter", "descriptions": ["5 seats"], "isActive": true },
                { "_id": "plan-2", "name": "Team", "descriptions": ["25 seats"], "isActive": false }
            ]}
        })))
        .mount(&server)
        .await;

    let plans = client.list_plans().await.unwrap();

    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].name, "Starter");
    assert!(!plans[1].is_active);
}

#[tokio::test]
async fn add_to_cart_creates_cart_on_first_use() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [cart_json("cart-other", "user-2")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/cart"))
        .and(body_json(json!({
            "userId": "user-1",
            "products": [{ "productId": "p1", "quantity": 1 }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": cart_json("cart-new", "user-1")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cart_id = client
        .add_to_cart(
            &user_session(),
            &CartItemRequest {
                product_id: "p1".into(),
                quantity: 1,
            },
        )
        .await
        .unwrap();

    assert_eq!(cart_id, "cart-new");
}

#[tokio::test]
async fn add_to_cart_reuses_existing_cart() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [cart_json("cart-mine", "user-1")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/cart/cart-mine/product"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Product added"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cart_id = client
        .add_to_cart(
            &user_session(),
            &CartItemRequest {
                product_id: "p1".into(),
                quantity: 3,
            },
        )
        .await
        .unwrap();

    assert_eq!(cart_id, "cart-mine");
}

#[tokio::test]
async fn apply_coupon_returns_repriced_cart() {
    let (server, client) = setup().await;
    let mut repriced = cart_json("cart-1", "user-1");
    repriced["discountPrice"] = json!(2.5);
    repriced["finalPrice"] = json!(22.5);
    Mock::given(method("POST"))
        .and(path("/api/cart/cart-1/coupon"))
        .and(body_json(json!({ "couponCode": "SAVE10" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "cart": repriced }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cart = client
        .apply_coupon(&user_session(), "cart-1", "  SAVE10 ")
        .await
        .unwrap();

    assert_eq!(cart.discount_price, Some(dec!(2.5)));
    assert_eq!(cart.payable(), dec!(22.5));
}

#[tokio::test]
async fn change_quantity_to_zero_removes_line() {
    let (server, client) = setup().await;
    Mock::given(method("DELETE"))
        .and(path("/api/cart/cart-1/product/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let cart: Cart = serde_json::from_value(cart_json("cart-1", "user-1")).unwrap();
    let next = client
        .change_quantity(&user_session(), &cart, "p1", -2)
        .await
        .unwrap();
    assert_eq!(next, 0);

    let err = client
        .change_quantity(&user_session(), &cart, "p9", 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn registration_reports_final_price() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/client/register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Client registered",
            "finalPrice": 1050
        })))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = client
        .register_client(&ClientRegistrationRequest {
            name: "Acme Ltd".into(),
            email: "billing@acme.example".into(),
            subscription_id: "offer-1".into(),
            coupon_code: Some("WELCOME".into()),
        })
        .await
        .unwrap();

    assert_eq!(receipt.message.as_deref(), Some("Client registered"));
    assert_eq!(receipt.final_price, Some(dec!(1050)));
}

#[tokio::test]
async fn public_coupon_list_tolerates_missing_data() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/client/coupons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;

    assert!(client.client_coupons().await.unwrap().is_empty());
}
