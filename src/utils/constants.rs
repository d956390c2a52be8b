/// Cleaning bounds
pub const MIN_VALID_TEMP: f64 = -50.0;
pub const MAX_VALID_TEMP: f64 = 50.0;
pub const MIN_VALID_HUMIDITY: f64 = 0.0;
pub const MAX_VALID_HUMIDITY: f64 = 100.0;
pub const MIN_VALID_PRECIPITATION: f64 = 0.0;

/// Synthetic series parameters
pub const TEMP_BASELINE: f64 = 15.0;
pub const TEMP_SEASONAL_AMPLITUDE: f64 = 10.0;
pub const TEMP_NOISE_STD: f64 = 3.0;
pub const DAYS_PER_YEAR: f64 = 365.25;
pub const HUMIDITY_MEAN: f64 = 65.0;
pub const HUMIDITY_STD: f64 = 15.0;
pub const PRECIPITATION_SCALE: f64 = 3.0;
pub const DRY_DAY_PROBABILITY: f64 = 0.7;
pub const WIND_GAMMA_SHAPE: f64 = 2.0;
pub const WIND_GAMMA_SCALE: f64 = 2.0;

/// Generation defaults
pub const DEFAULT_START_DATE: &str = "2023-01-01";
pub const DEFAULT_END_DATE: &str = "2023-12-31";
pub const DEFAULT_SEED: u64 = 42;

/// Isolation forest defaults
pub const DEFAULT_N_ESTIMATORS: usize = 100;
pub const DEFAULT_MAX_SAMPLES: usize = 256;
pub const AUTO_CONTAMINATION_OFFSET: f64 = -0.5;
pub const MAX_CONTAMINATION: f64 = 0.5;
pub const MIN_DETECTION_ROWS: usize = 2;

/// Narrative rules
pub const HEAT_RISK_MEAN_TEMP: f64 = 25.0;
pub const HEAVY_PRECIPITATION_MM: f64 = 20.0;
pub const FLOOD_RISK_HEAVY_DAYS: usize = 3;
pub const REPORT_EXAMPLE_DATES: usize = 2;
pub const DEFAULT_NARRATOR_TIMEOUT_SECS: u64 = 30;

/// Snapshot locations
pub const DEFAULT_RAW_DIR: &str = "data/raw";
pub const DEFAULT_PROCESSED_DIR: &str = "data/processed";
pub const RAW_SNAPSHOT_FILE: &str = "weather_data.csv";
pub const PROCESSED_SNAPSHOT_FILE: &str = "weather_data_clean.csv";

/// Configuration
pub const DEFAULT_CONFIG_FILE: &str = "weather-anomaly";
pub const ENV_PREFIX: &str = "WEATHER_ANOMALY";

/// Timestamp format used in report footers
pub const REPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
