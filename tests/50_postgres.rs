// Runs against a real database only when DATABASE_URL is set; otherwise each
// test returns early.

use anyhow::Result;
use uuid::Uuid;

use schoolbox_api::branding::Color;
use schoolbox_api::config::AppConfig;
use schoolbox_api::database::{NewSchool, PgSchoolStore, SchoolStore, SiteUpdate, StoreError, ThemeUpdate};

async fn connect() -> Result<Option<PgSchoolStore>> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping postgres store test");
        return Ok(None);
    };
    let mut config = AppConfig::development().database;
    config.url = Some(url);
    Ok(Some(PgSchoolStore::connect(&config).await?))
}

fn new_school(tag: &str) -> NewSchool {
    let suffix = Uuid::new_v4().simple().to_string();
    NewSchool {
        admin_id: Uuid::new_v4(),
        name: format!("{} School", tag),
        slug: format!("{}-{}", tag, &suffix[..12]),
        logo_url: None,
    }
}

// One test so the bootstrap DDL is never raced by parallel connects.
#[tokio::test]
async fn postgres_store_round_trip() -> Result<()> {
    let Some(store) = connect().await? else {
        return Ok(());
    };
    store.health_check().await?;

    let school = store.insert(new_school("pg")).await?;
    assert_eq!(school.version, 0);
    assert!(school.theme_palette.is_empty());

    // duplicate slug and duplicate admin both conflict
    let mut dup_slug = new_school("pg");
    dup_slug.slug = school.slug.clone();
    assert!(matches!(store.insert(dup_slug).await, Err(StoreError::Conflict(_))));
    let mut dup_admin = new_school("pg");
    dup_admin.admin_id = school.admin_id;
    assert!(matches!(store.insert(dup_admin).await, Err(StoreError::Conflict(_))));

    let navy = Color::rgb(11, 18, 32);
    let themed = store
        .update_theme(
            school.id,
            ThemeUpdate {
                theme_color: navy,
                logo_url: Some("https://cdn.example.com/logo.png".to_string()),
                palette: Some(vec![Color::rgb(6, 182, 212), navy]),
            },
            Some(0),
        )
        .await?;
    assert_eq!(themed.version, 1);
    assert_eq!(themed.theme_color, Some(navy));
    assert_eq!(themed.theme_palette, vec![Color::rgb(6, 182, 212), navy]);

    // manual write leaves logo and palette alone
    let manual = store
        .update_theme(
            school.id,
            ThemeUpdate {
                theme_color: Color::WHITE,
                logo_url: None,
                palette: None,
            },
            None,
        )
        .await?;
    assert_eq!(manual.version, 2);
    assert_eq!(manual.logo_url.as_deref(), Some("https://cdn.example.com/logo.png"));
    assert_eq!(manual.theme_palette.len(), 2);

    let stale = store
        .update_theme(
            school.id,
            ThemeUpdate {
                theme_color: navy,
                logo_url: None,
                palette: None,
            },
            Some(0),
        )
        .await
        .unwrap_err();
    assert!(matches!(stale, StoreError::VersionMismatch { expected: 0, actual: 2 }));

    let missing = store
        .update_site(
            Uuid::new_v4(),
            SiteUpdate {
                html_content: Some("<p>x</p>".to_string()),
                is_published: Some(true),
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(missing, StoreError::NotFound(_)));

    let published = store
        .update_site(
            school.id,
            SiteUpdate {
                html_content: Some("<h1>Welcome</h1>".to_string()),
                is_published: Some(true),
            },
            Some(2),
        )
        .await?;
    assert!(published.is_published);

    let by_slug = store.find_by_slug(&school.slug).await?.expect("school by slug");
    assert_eq!(by_slug.html_content.as_deref(), Some("<h1>Welcome</h1>"));
    assert_eq!(store.find_by_admin(school.admin_id).await?.map(|s| s.id), Some(school.id));
    assert!(store.find_by_id(Uuid::new_v4()).await?.is_none());
    Ok(())
}
