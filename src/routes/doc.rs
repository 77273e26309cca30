use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{AdjustStockRequest, LowStockList, UserList},
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        addresses::{AddressList, CreateAddressRequest, UpdateAddressRequest},
        cart::{AddToCartRequest, CartItemDto, CartList, CartSummary, UpdateCartItemRequest},
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        coupons::{
            CouponList, CouponValidation, CreateCouponRequest, UpdateCouponRequest,
            ValidateCouponRequest,
        },
        orders::{
            CheckoutCartRequest, CreateOrderRequest, OrderItemRequest, OrderList, OrderStats,
            OrderWithItems, StatusCount, UpdateOrderStatusRequest,
        },
        payments::{
            CreateInvoiceRequest, CreateVirtualAccountRequest, PaymentCharge, WebhookPayload,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{
            CreateReviewRequest, ProductReviews, ReviewList, ReviewStats, UpdateReviewRequest,
        },
        wishlist::{AddWishlistRequest, WishlistCheck, WishlistProductList},
    },
    models::{
        CartItem, Category, Coupon, Order, OrderItem, Payment, Product, Review, ShippingAddress,
        User, WishlistItem,
    },
    response::{ApiResponse, Meta},
    routes::{
        addresses, admin, auth, cart, categories, coupons, health, orders, params, payments,
        products, reviews, wishlist,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        products::list_products,
        products::get_product,
        products::get_product_by_slug,
        products::create_product,
        products::update_product,
        products::delete_product,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_cart_item,
        cart::clear_cart,
        cart::cart_summary,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        wishlist::check_wishlist,
        coupons::validate_coupon,
        coupons::get_coupon_by_code,
        coupons::list_coupons,
        coupons::create_coupon,
        coupons::update_coupon,
        coupons::remove_coupon,
        orders::create_order,
        orders::checkout_cart,
        orders::list_orders,
        orders::get_order,
        orders::update_order_status,
        orders::cancel_order,
        orders::order_stats,
        payments::create_invoice,
        payments::create_virtual_account,
        payments::webhook,
        payments::list_order_payments,
        reviews::create_review,
        reviews::list_my_reviews,
        reviews::list_product_reviews,
        reviews::update_review,
        reviews::delete_review,
        addresses::create_address,
        addresses::list_addresses,
        addresses::get_primary_address,
        addresses::update_address,
        addresses::set_primary_address,
        addresses::remove_address,
        admin::list_users,
        admin::deactivate_user,
        admin::list_low_stock,
        admin::adjust_stock,
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            CartItem,
            WishlistItem,
            Coupon,
            Order,
            OrderItem,
            Payment,
            Review,
            ShippingAddress,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartItemDto,
            CartList,
            CartSummary,
            AddWishlistRequest,
            WishlistProductList,
            WishlistCheck,
            CreateCouponRequest,
            UpdateCouponRequest,
            ValidateCouponRequest,
            CouponValidation,
            CouponList,
            OrderItemRequest,
            CreateOrderRequest,
            CheckoutCartRequest,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            OrderStats,
            StatusCount,
            CreateInvoiceRequest,
            CreateVirtualAccountRequest,
            PaymentCharge,
            WebhookPayload,
            CreateReviewRequest,
            UpdateReviewRequest,
            ReviewStats,
            ProductReviews,
            ReviewList,
            CreateAddressRequest,
            UpdateAddressRequest,
            AddressList,
            UserList,
            LowStockList,
            AdjustStockRequest,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::LowStockQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentCharge>,
            ApiResponse<ProductReviews>,
            ApiResponse<AddressList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "Coupons", description = "Coupon endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payments", description = "Payment endpoints"),
        (name = "Reviews", description = "Review endpoints"),
        (name = "Shipping addresses", description = "Address book endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
