/// Seed queue tests against a live database
///
/// ```bash
/// DATABASE_URL=postgres://localhost/regen_test cargo test -p regen-worker -- --ignored
/// ```

use regen_shared::auth::password::hash_password;
use regen_shared::db::migrations::run_migrations;
use regen_shared::models::enterprise::EnterpriseCategory;
use regen_shared::models::seed_job::{CreateSeedJob, SeedJob, SeedJobStatus};
use regen_shared::models::user::{CreateUser, User};
use regen_worker::queue::{QueueError, SeedQueue};
use regen_worker::seeder;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

async fn setup() -> (PgPool, User) {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
    let db = PgPool::connect(&url).await.unwrap();
    run_migrations(&db).await.unwrap();

    let admin = User::create(
        &db,
        CreateUser {
            email: format!("seed-admin-{}@example.org", uuid::Uuid::new_v4()),
            password_hash: hash_password("Mycorrhiza2024").unwrap(),
            name: None,
        },
    )
    .await
    .unwrap();

    (db, admin)
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_claimed_job_runs_to_success() {
    let (db, admin) = setup().await;
    let job = SeedJob::create(
        &db,
        admin.id,
        CreateSeedJob {
            category: Some(EnterpriseCategory::Forestry),
            count: 4,
        },
    )
    .await
    .unwrap();

    let queue = SeedQueue::with_batch_size(db.clone(), 50);
    let claimed = queue.claim_jobs(None).await.unwrap();
    let job = claimed.into_iter().find(|j| j.id == job.id).expect("job claimed");
    assert_eq!(job.status, SeedJobStatus::Running);
    assert!(job.started_at.is_some());

    // A second claim never returns the same job
    let again = queue.claim_jobs(None).await.unwrap();
    assert!(again.iter().all(|j| j.id != job.id));

    let created = seeder::run_job(&db, &job, &CancellationToken::new()).await.unwrap();
    assert_eq!(created, 4);
    queue.mark_succeeded(job.id, created).await.unwrap();

    let finished = SeedJob::find_by_id(&db, job.id).await.unwrap().unwrap();
    assert_eq!(finished.status, SeedJobStatus::Succeeded);
    assert_eq!(finished.created_count, 4);

    // Terminal jobs can't be finished twice
    assert!(matches!(
        queue.mark_failed(job.id, "late").await,
        Err(QueueError::JobNotRunning(_))
    ));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_canceled_job_is_never_claimed() {
    let (db, admin) = setup().await;
    let job = SeedJob::create(&db, admin.id, CreateSeedJob { category: None, count: 1 })
        .await
        .unwrap();
    assert!(SeedJob::cancel_pending(&db, job.id).await.unwrap());

    let claimed = SeedQueue::with_batch_size(db.clone(), 50).claim_jobs(None).await.unwrap();
    assert!(claimed.iter().all(|j| j.id != job.id));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_interrupted_job_commits_nothing() {
    let (db, admin) = setup().await;
    let job = SeedJob::create(&db, admin.id, CreateSeedJob { category: None, count: 3 })
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = seeder::run_job(&db, &job, &cancel).await;
    assert!(matches!(result, Err(seeder::SeedError::Interrupted)));
}
