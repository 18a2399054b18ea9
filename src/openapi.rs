use utoipa::OpenApi;

/// OpenAPI document served through Swagger UI at `/docs`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ferretería API",
        version = "0.3.0",
        description = "Hardware store storefront backend: catalog, session carts, coupon \
                       discounts, checkout, and warehouse fulfillment with inventory tracking."
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::warehouse::list_orders,
        crate::handlers::warehouse::confirm_order,
        crate::handlers::warehouse::ship_order,
        crate::handlers::warehouse::purge_orders,
        crate::handlers::warehouse::list_movements,
        crate::handlers::warehouse::low_stock,
    ),
    components(schemas(crate::errors::ErrorResponse)),
    tags(
        (name = "catalog", description = "Product catalog"),
        (name = "warehouse", description = "Order workflow, inventory movements and dispatch")
    )
)]
pub struct ApiDoc;
