use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::config::PlannerConfig;
use crate::domain::types::Location;
use crate::error::DataError;
use crate::setup::init::Instance;
use crate::setup::init_types::LocationRecord;

/// Reads the location list (JSON array of records).
pub fn read_location_records(path: impl AsRef<Path>) -> Result<Vec<LocationRecord>, DataError> {
    let content = fs::read_to_string(path.as_ref())?;
    let records: Vec<LocationRecord> = serde_json::from_str(&content)?;
    info!(
        "Read {} location records from {}",
        records.len(),
        path.as_ref().display()
    );
    Ok(records)
}

/// Reads the travel-cost matrix (JSON array of rows).
pub fn read_cost_matrix(path: impl AsRef<Path>) -> Result<Vec<Vec<f64>>, DataError> {
    let content = fs::read_to_string(path.as_ref())?;
    let matrix: Vec<Vec<f64>> = serde_json::from_str(&content)?;
    Ok(matrix)
}

/// Reads one demand per delivery row, skipping the leading header rows.
/// The demand is the leading integer of the configured column.
pub fn read_demands(
    path: impl AsRef<Path>,
    header_rows: usize,
    column: usize,
) -> Result<Vec<i64>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path.as_ref())?;

    let mut demands = Vec::new();
    for (idx, row) in reader.records().enumerate().skip(header_rows) {
        let record = row?;
        let raw = record.get(column).ok_or_else(|| {
            DataError::new(format!("demand row {idx} has no column {column}"))
        })?;
        demands.push(parse_leading_integer(raw).ok_or_else(|| {
            DataError::new(format!("demand row {idx} has unreadable value '{raw}'"))
        })?);
    }
    Ok(demands)
}

/// `"3 pallets"` -> 3, `"-1"` -> -1, `"2.5"` -> 2, `""` -> None.
fn parse_leading_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, raw),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|v| sign * v)
}

/// Loads the instance from the three configured files.
pub fn load_instance(config: &PlannerConfig) -> Result<Instance, DataError> {
    let records = read_location_records(&config.locations_path)?;
    let costs = read_cost_matrix(&config.costs_path)?;
    let demands = read_demands(
        &config.demands_path,
        config.demand_header_rows,
        config.demand_column,
    )?;
    Instance::from_records(&records, costs, &demands, config)
}

pub fn input_files_present(config: &PlannerConfig) -> bool {
    [
        &config.locations_path,
        &config.costs_path,
        &config.demands_path,
    ]
    .iter()
    .all(|p| Path::new(p.as_str()).exists())
}

/// Seeded random instance: `customers` stops scattered around a depot at the
/// origin, demands in `0..=capacity` and Euclidean travel costs.
pub fn generate_instance(
    customers: usize,
    seed: u64,
    config: &PlannerConfig,
) -> Result<Instance, DataError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut locations = Vec::with_capacity(customers + 1);
    locations.push(Location::new("depot", "Warehouse", 0.0, 0.0));
    for i in 1..=customers {
        let longitude = rng.gen_range(-10.0..10.0);
        let latitude = rng.gen_range(-10.0..10.0);
        locations.push(Location::new(format!("C{i}"), "Agency", longitude, latitude));
    }

    let mut demands = vec![0_i64];
    for _ in 0..customers {
        demands.push(rng.gen_range(0..=config.capacity as i64));
    }
    let zeros = demands.iter().skip(1).filter(|&&d| d == 0).count();
    if zeros > 0 {
        warn!("Generated {} zero-demand locations", zeros);
    }

    let costs = euclidean_costs(&locations);
    Instance::new(locations, &demands, costs, config.capacity, config.zero_demand)
}

pub fn euclidean_costs(locations: &[Location]) -> Vec<Vec<f64>> {
    locations
        .iter()
        .map(|a| {
            locations
                .iter()
                .map(|b| (a.longitude - b.longitude).hypot(a.latitude - b.latitude))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn leading_integer_parsing() {
        assert_eq!(parse_leading_integer("3"), Some(3));
        assert_eq!(parse_leading_integer("12 pallets"), Some(12));
        assert_eq!(parse_leading_integer("2.5"), Some(2));
        assert_eq!(parse_leading_integer("-1"), Some(-1));
        assert_eq!(parse_leading_integer("n/a"), None);
    }

    #[test]
    fn demand_csv_skips_headers() {
        let path = std::env::temp_dir().join("cvrp_planner_demands_test.csv");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "Demand table,,,,,,").unwrap();
        writeln!(file, "id,name,a,b,c,d,pallets").unwrap();
        writeln!(file, "1,North,,,,,4").unwrap();
        writeln!(file, "2,South,,,,,0").unwrap();
        writeln!(file, "3,East,,,,,10 (2 drops)").unwrap();
        drop(file);

        let demands = read_demands(&path, 2, 6).unwrap();
        assert_eq!(demands, vec![4, 0, 10]);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn generated_instance_is_reproducible() {
        let config = PlannerConfig::default();
        let a = generate_instance(15, 7, &config).unwrap();
        let b = generate_instance(15, 7, &config).unwrap();
        assert_eq!(a.num_locations(), 16);
        assert_eq!(a.demands(), b.demands());
        assert_eq!(a.locations(), b.locations());
        assert!(a.demands().iter().all(|&d| d <= config.capacity));
        assert!(a.customers().all(|i| a.demand(i) >= 1));
    }
}
