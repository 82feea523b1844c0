// Unit conversions
pub const USD_TO_EUR: f64 = 0.92;
pub const KW_PER_MW: f64 = 1000.0;
pub const WEEKS_PER_YEAR: f64 = 52.0;
pub const HOURS_PER_WEEK: f64 = 168.0;
pub const DAYS_PER_PROFILE: i64 = 7;

// Carbon pricing (EUR per tonne CO2e)
pub const CARBON_TAX: f64 = 86.0;                     // EU ETS price, Jan 2023
pub const SOCIAL_CARBON_COST: f64 = USD_TO_EUR * 185.0; // RFF estimate, converted from USD

// Emissions intensity (tCO2e per MWh, lifecycle)
pub const SOLAR_EMISSIONS: f64 = 0.041;
pub const WIND_EMISSIONS: f64 = 0.011;
pub const NUCLEAR_EMISSIONS: f64 = 0.024;
pub const GAS_EMISSIONS: f64 = 0.430;
pub const COAL_EMISSIONS: f64 = 0.980;

// Fuel cost (EUR per MWh dispatched)
pub const SOLAR_FUEL_COST: f64 = 0.0;
pub const WIND_FUEL_COST: f64 = 0.0;
pub const NUCLEAR_FUEL_COST: f64 = 10.0;
pub const COAL_FUEL_COST: f64 = 30.0;
pub const GAS_FUEL_COST: f64 = 40.0;

// Overnight capital cost (USD per kW installed)
pub const SOLAR_CAPEX: f64 = 1291.0;
pub const WIND_CAPEX: f64 = (3150.0 + 3901.0) / 2.0;
pub const NUCLEAR_CAPEX: f64 = 9440.0;
pub const GAS_CAPEX: f64 = (1120.0 + 1283.0) / 2.0;
pub const COAL_CAPEX: f64 = (3549.0 + 6215.0) / 2.0;

// Fixed operation and maintenance (USD per kW per year)
pub const SOLAR_FIXED_OM: f64 = 18.0;
pub const WIND_FIXED_OM: f64 = (116.0 + 102.0) / 2.0;
pub const NUCLEAR_FIXED_OM: f64 = 152.0;
pub const GAS_FIXED_OM: f64 = (24.0 + 31.0) / 2.0;
pub const COAL_FIXED_OM: f64 = (77.0 + 150.0) / 2.0;

// Cost recovery periods (years)
pub const SOLAR_LIFETIME: f64 = 30.0;
pub const WIND_LIFETIME: f64 = 30.0;
pub const NUCLEAR_LIFETIME: f64 = 60.0;
pub const GAS_LIFETIME: f64 = 30.0;
pub const COAL_LIFETIME: f64 = 30.0;

// Solver defaults
pub const DEFAULT_RESTARTS: usize = 8;
pub const DEFAULT_MAX_ITERATIONS: usize = 400;
pub const DEFAULT_TOLERANCE: f64 = 1e-9;
pub const DEFAULT_PENALTY_MULTIPLIER: f64 = 1000.0;
pub const DEFAULT_TRIM_ITERATIONS: usize = 64;
pub const DEFAULT_SEED: u64 = 42;
pub const INITIAL_SIMPLEX_STEP: f64 = 0.1;
pub const TRIM_OBJECTIVE_SLACK: f64 = 1e-9;     // relative, accepted while trimming capacity

// Nelder-Mead coefficients
pub const NM_REFLECTION: f64 = 1.0;
pub const NM_EXPANSION: f64 = 2.0;
pub const NM_CONTRACTION: f64 = 0.5;
pub const NM_SHRINK: f64 = 0.5;

// Batch defaults
pub const DEFAULT_WORKERS: usize = 4;
pub const WEEK_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

// Reporting
pub const WINDOW_TOLERANCE_MW: f64 = 1e-6;
