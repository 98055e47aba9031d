//! Typed client for the remote storefront API.
//!
//! Every response is an envelope `{ success, data, message }`. Non-2xx
//! statuses and `success: false` envelopes surface as
//! [`ServiceError::ExternalApiError`]; transport failures surface as
//! [`ServiceError::ExternalServiceError`]. Nothing is retried.

use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;
use validator::Validate;

use crate::{
    auth::{Role, Session},
    config::AppConfig,
    errors::ServiceError,
    models::{
        cart::{ApplyCouponRequest, ApplyCouponResponse, CartItemRequest, CreateCartRequest, UpdateQuantityRequest},
        Cart, ClientRegistrationRequest, Coupon, CreateCouponRequest, CreatePlanRequest,
        LoginRequest, LoginResponse, Product, ProductRequest, RegisterOfferRequest,
        RegisteredClient, SubscriptionOffer, SubscriptionPlan,
    },
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    #[serde(default = "assume_success")]
    success: bool,
    data: Option<T>,
    message: Option<String>,
    final_price: Option<Decimal>,
}

fn assume_success() -> bool {
    true
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, ServiceError> {
        self.data
            .ok_or_else(|| ServiceError::ExternalApiError("response carried no data".into()))
    }
}

/// Some listings wrap their array one level deeper (`data.data`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Nested { data: Vec<T> },
    Flat(Vec<T>),
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Nested { data } => data,
            Listing::Flat(items) => items,
        }
    }
}

/// Outcome of a client registration as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReceipt {
    pub message: Option<String>,
    pub final_price: Option<Decimal>,
}

#[derive(Clone, Debug)]
pub struct StorefrontClient {
    http: reqwest::Client,
    base_url: Url,
}

impl StorefrontClient {
    /// `base_url` includes the API prefix, e.g. `http://localhost:8080/api`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let parsed = Url::parse(base_url).map_err(|e| {
            ServiceError::InvalidInput(format!("invalid API base URL {}: {}", base_url, e))
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ServiceError::InvalidInput(format!(
                "API base URL {} cannot carry a path",
                base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: parsed,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Self::new(&config.api_base_url, config.api_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ServiceError::InvalidInput(format!(
                    "API base URL {} cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        session: Option<&Session>,
    ) -> Result<RequestBuilder, ServiceError> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "storefront API request");
        let builder = self.http.request(method, url);
        Ok(match session {
            Some(session) => builder.bearer_auth(session.token()),
            None => builder,
        })
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Envelope<T>, ServiceError> {
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Envelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            warn!(status = status.as_u16(), %message, "storefront API rejected request");
            return Err(ServiceError::ExternalApiError(format!(
                "{}: {}",
                status.as_u16(),
                message
            )));
        }

        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        if !envelope.success {
            let message = envelope
                .message
                .unwrap_or_else(|| "request was not successful".to_string());
            warn!(%message, "storefront API reported failure");
            return Err(ServiceError::ExternalApiError(message));
        }
        Ok(envelope)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        self.dispatch::<T>(request).await?.into_data()
    }

    /// Sends a request whose payload is not needed, returning the server message.
    async fn execute(&self, request: RequestBuilder) -> Result<Option<String>, ServiceError> {
        Ok(self.dispatch::<serde_json::Value>(request).await?.message)
    }

    // Authentication

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Session, ServiceError> {
        credentials.validate()?;
        let request = self
            .request(Method::POST, &["user", "login"], None)?
            .json(credentials);
        let response: LoginResponse = self.fetch(request).await?;
        Session::try_from(response)
    }

    // Products

    pub async fn list_products(&self, session: &Session) -> Result<Vec<Product>, ServiceError> {
        let request = self.request(Method::GET, &["product", "getAllProduct"], Some(session))?;
        self.fetch(request).await
    }

    #[instrument(skip(self, session, product), fields(name = %product.name))]
    pub async fn create_product(
        &self,
        session: &Session,
        product: &ProductRequest,
    ) -> Result<Product, ServiceError> {
        session.require_role(Role::Admin)?;
        product.validate()?;
        let request = self
            .request(Method::POST, &["product", "createProduct"], Some(session))?
            .json(product);
        self.fetch(request).await
    }

    #[instrument(skip(self, session, product))]
    pub async fn update_product(
        &self,
        session: &Session,
        product_id: &str,
        product: &ProductRequest,
    ) -> Result<Product, ServiceError> {
        session.require_role(Role::Admin)?;
        product.validate()?;
        let request = self
            .request(
                Method::PUT,
                &["product", "updateProduct", product_id],
                Some(session),
            )?
            .json(product);
        self.fetch(request).await
    }

    #[instrument(skip(self, session))]
    pub async fn delete_product(
        &self,
        session: &Session,
        product_id: &str,
    ) -> Result<Option<String>, ServiceError> {
        session.require_role(Role::Admin)?;
        let request = self.request(
            Method::DELETE,
            &["product", "deleteProduct", product_id],
            Some(session),
        )?;
        self.execute(request).await
    }

    // Carts

    pub async fn list_carts(&self, session: &Session) -> Result<Vec<Cart>, ServiceError> {
        session.require_role(Role::User)?;
        let request = self.request(Method::GET, &["cart"], Some(session))?;
        self.fetch(request).await
    }

    /// The cart owned by the session's user, if one exists.
    pub async fn own_cart(&self, session: &Session) -> Result<Option<Cart>, ServiceError> {
        let carts = self.list_carts(session).await?;
        Ok(carts
            .into_iter()
            .find(|cart| cart.belongs_to(session.user_id())))
    }

    pub async fn create_cart(
        &self,
        session: &Session,
        cart: &CreateCartRequest,
    ) -> Result<Cart, ServiceError> {
        session.require_role(Role::User)?;
        cart.validate()?;
        if cart.user_id != session.user_id() {
            return Err(ServiceError::Forbidden(
                "cannot create a cart for another user".into(),
            ));
        }
        let request = self.request(Method::POST, &["cart"], Some(session))?.json(cart);
        self.fetch(request).await
    }

    /// Adds a product to the user's cart, creating the cart on first use.
    /// Returns the id of the cart that received the item.
    #[instrument(skip(self, session, item), fields(product_id = %item.product_id))]
    pub async fn add_to_cart(
        &self,
        session: &Session,
        item: &CartItemRequest,
    ) -> Result<String, ServiceError> {
        item.validate()?;
        match self.own_cart(session).await? {
            Some(cart) => {
                let request = self
                    .request(Method::POST, &["cart", cart.id.as_str(), "product"], Some(session))?
                    .json(item);
                self.execute(request).await?;
                Ok(cart.id)
            }
            None => {
                let created = self
                    .create_cart(
                        session,
                        &CreateCartRequest {
                            user_id: session.user_id().to_string(),
                            products: vec![item.clone()],
                        },
                    )
                    .await?;
                Ok(created.id)
            }
        }
    }

    pub async fn update_quantity(
        &self,
        session: &Session,
        cart_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<Option<String>, ServiceError> {
        session.require_role(Role::User)?;
        let body = UpdateQuantityRequest { quantity };
        body.validate()?;
        let request = self
            .request(
                Method::PUT,
                &["cart", cart_id, "product", product_id],
                Some(session),
            )?
            .json(&body);
        self.execute(request).await
    }

    pub async fn remove_from_cart(
        &self,
        session: &Session,
        cart_id: &str,
        product_id: &str,
    ) -> Result<Option<String>, ServiceError> {
        session.require_role(Role::User)?;
        let request = self.request(
            Method::DELETE,
            &["cart", cart_id, "product", product_id],
            Some(session),
        )?;
        self.execute(request).await
    }

    /// Moves a line's quantity by `change`; reaching zero removes the line.
    /// Returns the new quantity.
    pub async fn change_quantity(
        &self,
        session: &Session,
        cart: &Cart,
        product_id: &str,
        change: i64,
    ) -> Result<u32, ServiceError> {
        let next = cart.adjusted_quantity(product_id, change).ok_or_else(|| {
            ServiceError::NotFound(format!("product {} is not in cart {}", product_id, cart.id))
        })?;
        if next == 0 {
            self.remove_from_cart(session, &cart.id, product_id).await?;
        } else {
            self.update_quantity(session, &cart.id, product_id, next)
                .await?;
        }
        Ok(next)
    }

    /// Applies a coupon server-side and returns the repriced cart.
    #[instrument(skip(self, session))]
    pub async fn apply_coupon(
        &self,
        session: &Session,
        cart_id: &str,
        coupon_code: &str,
    ) -> Result<Cart, ServiceError> {
        session.require_role(Role::User)?;
        let body = ApplyCouponRequest {
            coupon_code: coupon_code.trim().to_string(),
        };
        body.validate()?;
        let request = self
            .request(Method::POST, &["cart", cart_id, "coupon"], Some(session))?
            .json(&body);
        let response: ApplyCouponResponse = self.fetch(request).await?;
        Ok(response.cart)
    }

    // Coupons

    pub async fn list_coupons(&self, session: &Session) -> Result<Vec<Coupon>, ServiceError> {
        let request = self.request(Method::GET, &["coupon", "list"], Some(session))?;
        self.fetch(request).await
    }

    #[instrument(skip(self, session, coupon), fields(code = %coupon.code))]
    pub async fn create_coupon(
        &self,
        session: &Session,
        coupon: &CreateCouponRequest,
    ) -> Result<Coupon, ServiceError> {
        session.require_role(Role::Admin)?;
        coupon.validate()?;
        let request = self
            .request(Method::POST, &["coupon", "create"], Some(session))?
            .json(coupon);
        self.fetch(request).await
    }

    // Client registration

    /// Offers shown on the public registration form.
    pub async fn client_subscriptions(&self) -> Result<Vec<SubscriptionOffer>, ServiceError> {
        let request = self.request(Method::GET, &["client", "subscriptions"], None)?;
        self.fetch(request).await
    }

    /// Coupons shown on the public registration form.
    pub async fn client_coupons(&self) -> Result<Vec<Coupon>, ServiceError> {
        let request = self.request(Method::GET, &["client", "coupons"], None)?;
        Ok(self
            .dispatch::<Vec<Coupon>>(request)
            .await?
            .data
            .unwrap_or_default())
    }

    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register_client(
        &self,
        registration: &ClientRegistrationRequest,
    ) -> Result<RegistrationReceipt, ServiceError> {
        registration.validate()?;
        let request = self
            .request(Method::POST, &["client", "register"], None)?
            .json(registration);
        let envelope = self.dispatch::<serde_json::Value>(request).await?;
        Ok(RegistrationReceipt {
            message: envelope.message,
            final_price: envelope.final_price,
        })
    }

    pub async fn list_clients(
        &self,
        session: &Session,
    ) -> Result<Vec<RegisteredClient>, ServiceError> {
        session.require_role(Role::Admin)?;
        let request = self.request(Method::GET, &["client", "list"], Some(session))?;
        self.fetch(request).await
    }

    // Subscription plans

    pub async fn list_plans(&self) -> Result<Vec<SubscriptionPlan>, ServiceError> {
        let request = self.request(Method::GET, &["subscription", "subscriptions"], None)?;
        let listing: Listing<SubscriptionPlan> = self.fetch(request).await?;
        Ok(listing.into_vec())
    }

    #[instrument(skip(self, session, plan), fields(name = %plan.name))]
    pub async fn create_plan(
        &self,
        session: &Session,
        plan: &CreatePlanRequest,
    ) -> Result<SubscriptionPlan, ServiceError> {
        session.require_role(Role::Admin)?;
        plan.validate()?;
        let request = self
            .request(Method::POST, &["subscription", "add-subs"], Some(session))?
            .json(plan);
        self.fetch(request).await
    }

    /// Activates or deactivates a plan.
    #[instrument(skip(self, session))]
    pub async fn set_plan_active(
        &self,
        session: &Session,
        plan_id: &str,
        active: bool,
    ) -> Result<Option<String>, ServiceError> {
        session.require_role(Role::Admin)?;
        let action = if active { "activate" } else { "deactivate" };
        let request = self.request(
            Method::PUT,
            &["subscription", action, plan_id],
            Some(session),
        )?;
        self.execute(request).await
    }

    // Subscription offers

    pub async fn list_offers(&self) -> Result<Vec<SubscriptionOffer>, ServiceError> {
        let request = self.request(Method::GET, &["manageSubscription"], None)?;
        self.fetch(request).await
    }

    #[instrument(skip(self, session, offer), fields(plan = %offer.master_subscription_id))]
    pub async fn register_offer(
        &self,
        session: &Session,
        offer: &RegisterOfferRequest,
    ) -> Result<Option<String>, ServiceError> {
        session.require_role(Role::Admin)?;
        offer.validate()?;
        let request = self
            .request(
                Method::POST,
                &["manageSubscription", "register"],
                Some(session),
            )?
            .json(offer);
        self.execute(request).await
    }
}
