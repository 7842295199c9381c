//! Basic usage example of the table cache.

use dao_cache::{
    error::Result, Cache, CacheConfig, CacheEntity, DataRepository, Field, FieldValue,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Example entity: Employment
#[derive(Clone, Debug)]
struct Employment {
    id: String,
    loanapp_id: String,
    employer_name: String,
    salary: f64,
}

impl CacheEntity for Employment {
    fn table_name() -> &'static str {
        "Employment"
    }

    fn field_value(&self, field: &Field) -> Option<FieldValue> {
        match field.as_str() {
            "ID" => Some(self.id.clone().into()),
            "LoanappID" => Some(self.loanapp_id.clone().into()),
            "EmployerName" => Some(self.employer_name.clone().into()),
            "Salary" => Some(self.salary.into()),
            _ => None,
        }
    }
}

fn employment(id: &str, loanapp_id: &str, employer_name: &str, salary: f64) -> Employment {
    Employment {
        id: id.to_string(),
        loanapp_id: loanapp_id.to_string(),
        employer_name: employer_name.to_string(),
        salary,
    }
}

/// Mock repository that simulates database access
#[derive(Default)]
struct EmploymentRepository {
    written: Mutex<Vec<String>>,
}

impl DataRepository<Employment> for EmploymentRepository {
    async fn fetch_all(&self) -> Result<Vec<Employment>> {
        println!("  [DB] Loading all employments");

        Ok(vec![
            employment("emp_001", "loan_123", "Acme Corp", 75000.0),
            employment("emp_002", "loan_456", "Tech Inc", 95000.0),
            employment("emp_003", "loan_456", "Tech Inc", 62000.0),
        ])
    }

    async fn persist(&self, entity: Employment) -> Result<()> {
        println!("  [DB] Writing employment: {}", entity.id);
        self.written.lock().push(entity.id);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== DAO Cache - Basic Example ===\n");

    // 1. Configure the table
    println!("1. Activating Employment table...");
    let cache = Cache::new(CacheConfig::from_env());
    let repository = Arc::new(EmploymentRepository::default());

    cache
        .table::<Employment>()
        .with_key("ID")
        .with_index("LoanappID")
        .with_expiry(Duration::from_secs(3600))
        .activate()?;
    cache.register_repository::<Employment, _>(repository.clone())?;

    println!("   ✓ Table ready\n");

    // 2. Hydrate from the repository
    println!("2. Hydrating from database:");
    let loaded = cache.hydrate::<Employment>().await?;
    println!("   ✓ {} employments cached\n", loaded);

    // 3. Keyed lookup
    println!("3. Lookup by key (emp_001):");
    let emp = cache.get::<Employment>("emp_001")?;
    println!(
        "   ✓ Employment loaded from cache: {} (${:.2})\n",
        emp.employer_name, emp.salary
    );

    // 4. Filtered lookups
    println!("4. Lookup by field (LoanappID = loan_456):");
    let emps = cache.get_all_where::<Employment>("LoanappID", "loan_456")?;
    println!("   ✓ {} employments match", emps.len());
    match cache.get_where::<Employment>("LoanappID", "loan_456") {
        Ok(_) => println!("   ✗ Expected ambiguity\n"),
        Err(e) => println!("   ✓ Single-match lookup refused: {}\n", e),
    }

    // 5. Update and write back
    println!("5. Raising salary and synchronising:");
    let mut emp = cache.get::<Employment>("emp_003")?;
    emp.salary = 70000.0;
    cache.update(emp.clone())?;
    cache.synchronise_entry(&emp).await?;
    println!("   ✓ Written back: {:?}\n", repository.written.lock());

    // 6. Remove and count
    println!("6. Removing emp_002:");
    cache.remove_by_key::<Employment>("emp_002")?;
    println!("   ✓ {} employments remain\n", cache.count::<Employment>()?);

    // 7. Purge and report
    println!("7. Purging expired entries:");
    let purged = cache.purge_expired_entries();
    println!("   ✓ {} entries purged", purged);
    println!("   ✓ Stats: {}\n", cache.stats_json()?);
    println!("{}", cache.dump());

    println!("=== Example Complete ===\n");

    Ok(())
}
