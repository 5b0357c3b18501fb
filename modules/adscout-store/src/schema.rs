//! Schema bootstrap. Applied at startup; every statement is idempotent.

pub(crate) const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS keywords (
        id                          BIGSERIAL    PRIMARY KEY,
        keyword                     TEXT         NOT NULL UNIQUE,
        status                      TEXT         NOT NULL DEFAULT 'pending',
        created_at                  TIMESTAMPTZ  NOT NULL DEFAULT now(),
        updated_at                  TIMESTAMPTZ  NOT NULL DEFAULT now(),
        processed_at                TIMESTAMPTZ,
        total_ads_found             BIGINT       NOT NULL DEFAULT 0,
        total_products_discovered   BIGINT       NOT NULL DEFAULT 0,
        processing_duration_seconds BIGINT,
        error_message               TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS discovered_products (
        id                            BIGSERIAL    PRIMARY KEY,
        keyword_id                    BIGINT       REFERENCES keywords(id),
        product_page_url              TEXT         NOT NULL,
        brand_domain                  TEXT         NOT NULL UNIQUE,
        brand_name                    TEXT,
        facebook_page_url             TEXT,
        facebook_page_id              TEXT,
        first_discovered              TIMESTAMPTZ  NOT NULL DEFAULT now(),
        last_seen_advertising         TIMESTAMPTZ,

        min_monthly_ad_spend          BIGINT,
        max_monthly_ad_spend          BIGINT,
        estimated_monthly_ad_spend    BIGINT,
        min_monthly_impressions       BIGINT,
        max_monthly_impressions       BIGINT,
        estimated_monthly_impressions BIGINT,
        ad_campaign_duration_days     INT,
        total_active_ads              INT,
        advertising_platforms_count   INT,
        advertising_platforms         TEXT,
        target_countries_count        INT,
        target_countries              TEXT,

        features_discount_offer       BOOLEAN,
        features_urgency_language     BOOLEAN,
        features_purchase_cta         BOOLEAN,
        features_social_proof         BOOLEAN,
        features_free_shipping        BOOLEAN,
        primary_call_to_action        TEXT,
        ad_creative_themes            TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS traffic_records (
        id             BIGSERIAL    PRIMARY KEY,
        product_id     BIGINT       NOT NULL UNIQUE REFERENCES discovered_products(id) ON DELETE CASCADE,
        monthly_visits BIGINT,
        data_source    TEXT,
        collected_at   TIMESTAMPTZ  NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_products_keyword_id ON discovered_products(keyword_id)",
    "CREATE INDEX IF NOT EXISTS idx_products_first_discovered ON discovered_products(first_discovered)",
    "CREATE INDEX IF NOT EXISTS idx_products_spend ON discovered_products(estimated_monthly_ad_spend)",
    "CREATE INDEX IF NOT EXISTS idx_keywords_status ON keywords(status)",
];
