//! The `mastery init` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::Paths;

pub fn execute(paths: &Paths) -> Result<()> {
    let config_path = paths
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("mastery.toml"));
    write_if_absent(&config_path, SAMPLE_CONFIG)?;

    let data_path = paths
        .data
        .clone()
        .unwrap_or_else(|| PathBuf::from("mastery-data.json"));
    write_if_absent(&data_path, SAMPLE_DATASET)?;

    println!("\nNext steps:");
    println!("  1. Edit mastery.toml to tune thresholds and limits");
    println!(
        "  2. Run: mastery attempt complete --student {SAMPLE_STUDENT} --indicator {SAMPLE_INDICATOR} --score 45"
    );
    println!("  3. Run: mastery recommend --student {SAMPLE_STUDENT}");

    Ok(())
}

fn write_if_absent(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

const SAMPLE_STUDENT: &str = "40000000-0000-4000-8000-000000000001";
const SAMPLE_INDICATOR: &str = "10000000-0000-4000-8000-000000000001";

const SAMPLE_CONFIG: &str = r#"# mastery configuration

# Score recorded for completions submitted without one
default_score = 80.0

# Averages strictly below this are recommended for reinforcement
reinforcement_threshold = 60.0

# Completed indicators untouched for longer than this are due for review
staleness_days = 14

# Recommendation limits
limit_indicators = 6
limit_resources = 3

# Candidate ordering: "insertion" or "lowest_score"
ranking = "insertion"

# Analytics
usage_window_days = 30
utc_offset_minutes = 0
struggling_limit = 5

data_path = "mastery-data.json"
"#;

const SAMPLE_DATASET: &str = r#"{
  "areas": [
    { "id": "a0000000-0000-4000-8000-000000000001", "name": "Mathematics" },
    { "id": "a0000000-0000-4000-8000-000000000002", "name": "Reading" }
  ],
  "competencies": [
    {
      "id": "c0000000-0000-4000-8000-000000000001",
      "area_id": "a0000000-0000-4000-8000-000000000001",
      "name": "Number sense"
    },
    {
      "id": "c0000000-0000-4000-8000-000000000002",
      "area_id": "a0000000-0000-4000-8000-000000000002",
      "name": "Comprehension"
    }
  ],
  "indicators": [
    {
      "id": "10000000-0000-4000-8000-000000000001",
      "area_id": "a0000000-0000-4000-8000-000000000001",
      "competency_id": "c0000000-0000-4000-8000-000000000001",
      "grade_code": "5",
      "code": "M5.NS.1",
      "description": "Compare and order fractions"
    },
    {
      "id": "10000000-0000-4000-8000-000000000002",
      "area_id": "a0000000-0000-4000-8000-000000000001",
      "competency_id": "c0000000-0000-4000-8000-000000000001",
      "grade_code": "5",
      "code": "M5.NS.2",
      "description": "Add and subtract decimals"
    },
    {
      "id": "10000000-0000-4000-8000-000000000003",
      "area_id": "a0000000-0000-4000-8000-000000000002",
      "competency_id": "c0000000-0000-4000-8000-000000000002",
      "grade_code": "5",
      "code": "R5.C.1",
      "description": "Identify the main idea of a text"
    }
  ],
  "resources": [
    {
      "id": "20000000-0000-4000-8000-000000000001",
      "indicator_id": { "$id": "10000000-0000-4000-8000-000000000001" },
      "type": "video",
      "title": "Fractions on a number line",
      "url": "https://example.org/fractions-video",
      "provider": "Open Math"
    },
    {
      "id": "20000000-0000-4000-8000-000000000002",
      "indicator_ids": ["10000000-0000-4000-8000-000000000001"],
      "type": "worksheet",
      "title": "Comparing fractions practice",
      "url": "https://example.org/fractions-sheet",
      "level": "basic"
    },
    {
      "id": "20000000-0000-4000-8000-000000000003",
      "indicator_ids": [" 10000000-0000-4000-8000-000000000002 "],
      "type": "game",
      "title": "Decimal darts",
      "url": "https://example.org/decimal-darts"
    },
    {
      "id": "20000000-0000-4000-8000-000000000004",
      "indicator_id": { "$id": "10000000-0000-4000-8000-000000000003" },
      "type": "reading",
      "title": "Retired passage",
      "url": "https://example.org/retired",
      "active": false
    },
    {
      "id": "20000000-0000-4000-8000-000000000005",
      "indicator_id": "10000000-0000-4000-8000-000000000003",
      "type": "reading",
      "title": "Finding the main idea",
      "url": "https://example.org/main-idea"
    }
  ],
  "teachers": [
    { "id": "30000000-0000-4000-8000-000000000001", "name": "Ms. Rivera" }
  ],
  "students": [
    {
      "id": "40000000-0000-4000-8000-000000000001",
      "name": "Ana",
      "grade_code": "5",
      "teacher_id": "30000000-0000-4000-8000-000000000001"
    },
    {
      "id": "40000000-0000-4000-8000-000000000002",
      "name": "Ben",
      "grade_code": "5",
      "teacher_id": "30000000-0000-4000-8000-000000000001"
    }
  ],
  "attempts": [],
  "progress": []
}
"#;
