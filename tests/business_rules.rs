use axum::{extract::Query, http::Uri};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use mobilku_api::models::{DiscountType, OrderStatus, PaymentStatus};
use mobilku_api::routes::params::{LowStockQuery, OrderListQuery, ProductQuery};
use mobilku_api::services::{cart_service, coupon_service, review_service};

#[test]
fn percentage_discount_is_capped_by_max_discount() {
    // 10% of 2,000,000 is 200,000, but the cap brings it down to 100,000.
    let discount = coupon_service::compute_discount(
        DiscountType::Percentage,
        dec!(10),
        Some(dec!(100000)),
        dec!(2000000),
    );
    assert_eq!(discount, dec!(100000));
    assert_eq!(dec!(2000000) - discount, dec!(1900000));
}

#[test]
fn percentage_discount_without_cap() {
    let discount =
        coupon_service::compute_discount(DiscountType::Percentage, dec!(25), None, dec!(400));
    assert_eq!(discount, dec!(100));
}

#[test]
fn fixed_discount_never_exceeds_the_total() {
    let discount = coupon_service::compute_discount(
        DiscountType::FixedAmount,
        dec!(50000),
        None,
        dec!(30000),
    );
    assert_eq!(discount, dec!(30000));
}

#[test]
fn fixed_discount_ignores_max_discount() {
    let discount = coupon_service::compute_discount(
        DiscountType::FixedAmount,
        dec!(20000),
        Some(dec!(5000)),
        dec!(100000),
    );
    assert_eq!(discount, dec!(20000));
}

#[test]
fn order_status_follows_the_linear_lifecycle() {
    use OrderStatus::*;

    assert!(Pending.can_transition_to(Processing));
    assert!(Pending.can_transition_to(Cancelled));
    assert!(Processing.can_transition_to(Shipped));
    assert!(Processing.can_transition_to(Cancelled));
    assert!(Shipped.can_transition_to(Delivered));

    assert!(!Pending.can_transition_to(Shipped));
    assert!(!Pending.can_transition_to(Delivered));
    assert!(!Shipped.can_transition_to(Cancelled));
    assert!(!Delivered.can_transition_to(Cancelled));
    assert!(!Cancelled.can_transition_to(Pending));
}

#[test]
fn only_early_statuses_are_cancellable() {
    assert!(OrderStatus::Pending.is_cancellable());
    assert!(OrderStatus::Processing.is_cancellable());
    assert!(!OrderStatus::Shipped.is_cancellable());
    assert!(!OrderStatus::Delivered.is_cancellable());
    assert!(!OrderStatus::Cancelled.is_cancellable());
}

#[test]
fn order_status_round_trips_through_strings() {
    for status in OrderStatus::ALL {
        assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(OrderStatus::parse("refunded"), None);
}

#[test]
fn gateway_status_mapping_defaults_to_pending() {
    assert_eq!(PaymentStatus::from_gateway("PAID"), PaymentStatus::Paid);
    assert_eq!(PaymentStatus::from_gateway("settled"), PaymentStatus::Paid);
    assert_eq!(PaymentStatus::from_gateway("expired"), PaymentStatus::Expired);
    assert_eq!(PaymentStatus::from_gateway("failed"), PaymentStatus::Failed);
    assert_eq!(
        PaymentStatus::from_gateway("something-new"),
        PaymentStatus::Pending
    );
}

#[test]
fn cart_totals_sums_lines_exactly() {
    let rows = vec![(dec!(255000000), 1), (dec!(615000000), 2)];
    let (items, amount) = cart_service::cart_totals(&rows);
    assert_eq!(items, 3);
    assert_eq!(amount, dec!(1485000000));

    let (items, amount) = cart_service::cart_totals(&[]);
    assert_eq!(items, 0);
    assert_eq!(amount, Decimal::ZERO);
}

#[test]
fn rating_stats_builds_a_zero_filled_histogram() {
    let stats = review_service::rating_stats(&[5, 4, 5, 1]);
    assert_eq!(stats.total_reviews, 4);
    assert_eq!(stats.rating_distribution, vec![1, 0, 0, 1, 2]);
    assert_eq!(stats.average_rating, dec!(3.75));

    let empty = review_service::rating_stats(&[]);
    assert_eq!(empty.total_reviews, 0);
    assert_eq!(empty.average_rating, Decimal::ZERO);
    assert_eq!(empty.rating_distribution, vec![0, 0, 0, 0, 0]);
}

#[test]
fn average_rating_is_rounded_to_two_places() {
    let stats = review_service::rating_stats(&[5, 4, 4]);
    assert_eq!(stats.average_rating, dec!(4.33));
}

#[test]
fn product_query_deserializes_pagination_with_filters() {
    let uri: Uri = "/api/products?page=2&per_page=10&q=civic&sort_by=price&sort_order=desc"
        .parse()
        .unwrap();
    let Query(query) = Query::<ProductQuery>::try_from_uri(&uri).unwrap();
    assert_eq!(query.pagination().normalize(), (2, 10, 10));
    assert_eq!(query.q.as_deref(), Some("civic"));

    let uri: Uri = "/api/products".parse().unwrap();
    let Query(query) = Query::<ProductQuery>::try_from_uri(&uri).unwrap();
    assert_eq!(query.pagination().normalize(), (1, 20, 0));
}

#[test]
fn order_and_low_stock_queries_deserialize_pagination() {
    let uri: Uri = "/api/orders?page=3&per_page=5&status=pending".parse().unwrap();
    let Query(query) = Query::<OrderListQuery>::try_from_uri(&uri).unwrap();
    assert_eq!(query.pagination().normalize(), (3, 5, 10));
    assert_eq!(query.status.as_deref(), Some("pending"));

    let uri: Uri = "/api/admin/inventory/low-stock?page=2&threshold=3"
        .parse()
        .unwrap();
    let Query(query) = Query::<LowStockQuery>::try_from_uri(&uri).unwrap();
    assert_eq!(query.pagination().normalize(), (2, 20, 20));
    assert_eq!(query.threshold, Some(3));
}

#[test]
fn discount_type_parsing_is_strict() {
    assert_eq!(
        DiscountType::parse("percentage"),
        Some(DiscountType::Percentage)
    );
    assert_eq!(
        DiscountType::parse("fixed_amount"),
        Some(DiscountType::FixedAmount)
    );
    assert_eq!(DiscountType::parse("Percentage"), None);
    assert_eq!(DiscountType::parse(""), None);
}
