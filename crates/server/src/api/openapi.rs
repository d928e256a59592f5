#![allow(clippy::needless_for_each)]

use vellum_delivery::{ListedDocument, PurchaseListing};

use super::schemas::{
    CreatePurchasesRequest, CreatePurchasesResponse, ErrorResponse, HealthResponse, WatermarkForm,
};

#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "Vellum API",
        version = "0.1.0",
        description = "HTTP API for selling downloadable documents: grant purchases and deliver per-buyer watermarked copies.",
        license(name = "Apache-2.0")
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Purchases", description = "Purchase batch creation"),
        (name = "Downloads", description = "Gated, watermarked document delivery"),
        (name = "Watermark", description = "Standalone PDF stamping")
    ),
    paths(
        super::health::health,
        super::purchases::create_purchases,
        super::download::download,
        super::watermark::watermark,
    ),
    components(schemas(
        HealthResponse,
        CreatePurchasesRequest,
        CreatePurchasesResponse,
        ErrorResponse,
        WatermarkForm,
        PurchaseListing,
        ListedDocument,
    ))
)]
pub struct ApiDoc;
