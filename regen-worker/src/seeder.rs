/// Sample enterprise generation
///
/// Builds plausible directory listings for a seed job and inserts them in a
/// single transaction: a job either adds all of its listings or none.
/// Listings are generated up front, then inserted one by one with the
/// cancellation token checked between rows, so a worker shutdown rolls the
/// job back instead of leaving half a batch behind.

use rand::seq::SliceRandom;
use rand::Rng;
use regen_shared::models::enterprise::{CreateEnterprise, Enterprise, EnterpriseCategory};
use regen_shared::models::seed_job::SeedJob;
use sqlx::PgPool;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Share of generated listings marked verified
const VERIFIED_RATIO: f64 = 0.3;

const LOCATIONS: &[&str] = &[
    "Ghent",
    "Bristol",
    "Freiburg",
    "Porto",
    "Asheville",
    "Kyoto",
    "Nairobi",
    "Valparaíso",
    "Tasmania",
    "Oaxaca",
];

/// Seeding error
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Worker shut down mid-job; nothing was committed
    #[error("Seeding interrupted by worker shutdown")]
    Interrupted,
}

fn name_parts(category: EnterpriseCategory) -> (&'static [&'static str], &'static [&'static str]) {
    match category {
        EnterpriseCategory::Agriculture => (
            &["Living Soil", "Deep Root", "Three Sisters", "Hedgerow", "Cover Crop"],
            &["Farm", "Co-op", "Growers", "Collective"],
        ),
        EnterpriseCategory::Forestry => (
            &["Old Growth", "Canopy", "Understory", "Mycelium", "Seed Stand"],
            &["Forestry", "Woodland Trust", "Nursery", "Agroforest"],
        ),
        EnterpriseCategory::Energy => (
            &["Sunfield", "Tidal", "Community Wind", "Micro Hydro", "Biogas"],
            &["Energy", "Power Co-op", "Microgrid", "Cooperative"],
        ),
        EnterpriseCategory::Water => (
            &["Watershed", "Rain Garden", "Wetland", "Spring Line", "Keyline"],
            &["Restoration", "Trust", "Works", "Alliance"],
        ),
        EnterpriseCategory::Materials => (
            &["Hempcrete", "Mycelium", "Reclaimed Timber", "Cob", "Bioplastics"],
            &["Materials", "Builders", "Workshop", "Labs"],
        ),
        EnterpriseCategory::Food => (
            &["Commons", "Harvest Table", "Wild Ferment", "Seed Bank", "Orchard"],
            &["Kitchen", "Food Hub", "Bakery", "Market"],
        ),
        EnterpriseCategory::Finance => (
            &["Patient Capital", "Land Trust", "Commons", "Bioregional", "Solidarity"],
            &["Fund", "Credit Union", "Finance", "Exchange"],
        ),
        EnterpriseCategory::Education => (
            &["Permaculture", "Land", "Ecoliteracy", "Regenerative", "Field"],
            &["Institute", "School", "Academy", "Learning Centre"],
        ),
        EnterpriseCategory::Other => (
            &["Regen", "Bioregion", "Kinship", "Tending", "Commons"],
            &["Network", "Studio", "Guild", "Project"],
        ),
    }
}

/// Generates one listing; a random category when `category` is `None`
pub fn generate_enterprise<R: Rng + ?Sized>(
    rng: &mut R,
    category: Option<EnterpriseCategory>,
) -> CreateEnterprise {
    let category = category.unwrap_or_else(|| {
        EnterpriseCategory::ALL[rng.gen_range(0..EnterpriseCategory::ALL.len())]
    });

    let (prefixes, suffixes) = name_parts(category);
    let prefix = prefixes.choose(rng).copied().unwrap_or("Regen");
    let suffix = suffixes.choose(rng).copied().unwrap_or("Project");
    let location = LOCATIONS.choose(rng).copied().unwrap_or("Ghent");
    let tag: u16 = rng.gen_range(100..1000);

    let name = format!("{} {} {}", prefix, suffix, tag);
    let slug = name.to_lowercase().replace(' ', "-");

    CreateEnterprise {
        description: Some(format!(
            "{} {} working on {} in {}.",
            prefix,
            suffix,
            category.as_str(),
            location
        )),
        category,
        location: Some(location.to_string()),
        website: Some(format!("https://{}.example.org", slug)),
        verified: rng.gen_bool(VERIFIED_RATIO),
        name,
    }
}

/// Generates `count` listings
pub fn generate_batch<R: Rng + ?Sized>(
    rng: &mut R,
    category: Option<EnterpriseCategory>,
    count: usize,
) -> Vec<CreateEnterprise> {
    (0..count).map(|_| generate_enterprise(rng, category)).collect()
}

/// Inserts the listings a job asks for
///
/// Returns the number of listings created.
pub async fn run_job(
    pool: &PgPool,
    job: &SeedJob,
    cancel: &CancellationToken,
) -> Result<i32, SeedError> {
    let count = usize::try_from(job.requested_count).unwrap_or(0);
    let batch = {
        let mut rng = rand::thread_rng();
        generate_batch(&mut rng, job.category, count)
    };

    let mut tx = pool.begin().await?;
    let mut created = 0;

    for listing in batch {
        if cancel.is_cancelled() {
            return Err(SeedError::Interrupted);
        }

        Enterprise::create(&mut *tx, listing).await?;
        created += 1;
    }

    tx.commit().await?;

    tracing::debug!(job_id = %job.id, created, "Seed listings inserted");
    Ok(created)
}
