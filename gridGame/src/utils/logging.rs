use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::{prelude::*, EnvFilter};
use tracing_timing::{Builder, Histogram};

// Recorded durations are clamped into this range (1 ns to 10 min)
const HISTOGRAM_MAX_NS: u64 = 600_000_000_000;
const HISTOGRAM_SIGFIG: u8 = 3;

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum OperationCategory {
    Dispatch,
    Solve,
    Batch,
    FileIO { subcategory: FileIOType },
    Other,
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum FileIOType {
    DataLoad,
    TableSave,
    TableLoad,
    Export,
}

impl OperationCategory {
    pub fn as_str(&self) -> String {
        match self {
            OperationCategory::Dispatch => "Dispatch".to_string(),
            OperationCategory::Solve => "Optimum Search".to_string(),
            OperationCategory::Batch => "Batch".to_string(),
            OperationCategory::FileIO { subcategory } => {
                format!("File I/O - {}", match subcategory {
                    FileIOType::DataLoad => "Data Load",
                    FileIOType::TableSave => "Table Save",
                    FileIOType::TableLoad => "Table Load",
                    FileIOType::Export => "Export",
                })
            }
            OperationCategory::Other => "Other Operations".to_string(),
        }
    }
}

thread_local! {
    static TIMING_STACK: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

lazy_static! {
    static ref TIMING_ENABLED: AtomicBool = AtomicBool::new(false);
    static ref FUNCTION_TIMINGS: Arc<RwLock<HashMap<String, Histogram<u64>>>> = Arc::new(RwLock::new(HashMap::new()));
    static ref CATEGORY_TIMINGS: Arc<RwLock<HashMap<OperationCategory, Histogram<u64>>>> = Arc::new(RwLock::new(HashMap::new()));
    static ref CALL_TREE: Arc<RwLock<HashMap<String, (Duration, usize, Vec<String>)>>> = Arc::new(RwLock::new(HashMap::new()));
}

/// Records the time between its creation and drop when timing is enabled.
pub struct TimingGuard {
    function_name: String,
    category: OperationCategory,
    start: Instant,
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        record_timing_end(&self.function_name, self.start.elapsed(), &self.category);
    }
}

pub fn start_timing(function_name: &str, category: OperationCategory) -> TimingGuard {
    if is_timing_enabled() {
        TIMING_STACK.with(|stack| stack.borrow_mut().push(function_name.to_string()));
    }
    TimingGuard {
        function_name: function_name.to_string(),
        category,
        start: Instant::now(),
    }
}

fn new_histogram() -> Option<Histogram<u64>> {
    Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_NS, HISTOGRAM_SIGFIG).ok()
}

fn record_timing_end(function_name: &str, duration: Duration, category: &OperationCategory) {
    if !is_timing_enabled() {
        return;
    }

    let duration_ns = (duration.as_nanos() as u64).clamp(1, HISTOGRAM_MAX_NS);

    TIMING_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.pop().is_some() {
            let mut tree = CALL_TREE.write();
            let entry = tree
                .entry(function_name.to_string())
                .or_insert((Duration::ZERO, 0, Vec::new()));
            entry.0 += duration;
            entry.1 += 1;
            if let Some(parent) = stack.last() {
                if !entry.2.contains(parent) {
                    entry.2.push(parent.clone());
                }
            }
        }
    });

    {
        let mut timings = FUNCTION_TIMINGS.write();
        if !timings.contains_key(function_name) {
            if let Some(histogram) = new_histogram() {
                timings.insert(function_name.to_string(), histogram);
            }
        }
        if let Some(histogram) = timings.get_mut(function_name) {
            let _ = histogram.record(duration_ns);
        }
    }

    {
        let mut category_timings = CATEGORY_TIMINGS.write();
        if !category_timings.contains_key(category) {
            if let Some(histogram) = new_histogram() {
                category_timings.insert(category.clone(), histogram);
            }
        }
        if let Some(histogram) = category_timings.get_mut(category) {
            let _ = histogram.record(duration_ns);
        }
    }
}

/// Install the global subscriber. Later calls (e.g. from tests) are ignored.
pub fn init_logging(enable_timing: bool, debug: bool) {
    TIMING_ENABLED.store(enable_timing, Ordering::SeqCst);

    let mut env_filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    if debug {
        if let Ok(directive) = "gridgame=debug".parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    let result = if enable_timing {
        let timing_layer = Builder::default().layer(|| {
            Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_NS, HISTOGRAM_SIGFIG)
                .unwrap_or_else(|_| Histogram::<u64>::new(HISTOGRAM_SIGFIG).expect("sigfig within 0..=5"))
        });
        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .with(timing_layer.boxed());
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(false));
        tracing::subscriber::set_global_default(subscriber)
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

pub fn is_timing_enabled() -> bool {
    TIMING_ENABLED.load(Ordering::SeqCst)
}

pub fn print_timing_report() {
    if !is_timing_enabled() {
        return;
    }

    println!("\nPerformance Report");
    println!("==================");

    println!("\nCall Tree:");
    println!("----------");
    let tree = CALL_TREE.read();
    let mut entries: Vec<_> = tree.iter().collect();
    entries.sort_by(|a, b| b.1 .0.cmp(&a.1 .0));

    for (function_name, (total, count, parents)) in entries {
        let avg = total.div_f64(*count as f64);
        println!(
            "{}: total={:.2}s, count={}, avg={:.3}ms{}",
            function_name,
            total.as_secs_f64(),
            count,
            avg.as_secs_f64() * 1000.0,
            if parents.is_empty() {
                String::new()
            } else {
                format!("\n  Called by: {}", parents.join(", "))
            }
        );
    }

    println!("\nPer function:");
    println!("-------------");
    let function_timings = FUNCTION_TIMINGS.read();
    let mut functions: Vec<_> = function_timings.iter().collect();
    functions.sort_by(|a, b| a.0.cmp(b.0));
    for (name, histogram) in functions {
        println!(
            "{}: p50={:.3}ms, max={:.3}ms",
            name,
            histogram.value_at_quantile(0.5) as f64 / 1_000_000.0,
            histogram.max() as f64 / 1_000_000.0,
        );
    }

    println!("\nBy category:");
    println!("------------");
    let category_timings = CATEGORY_TIMINGS.read();
    let mut categories: Vec<_> = category_timings.iter().collect();
    categories.sort_by(|a, b| b.1.mean().total_cmp(&a.1.mean()));

    let total_ns: f64 = categories.iter().map(|(_, h)| h.mean() * h.len() as f64).sum();

    for (category, histogram) in categories {
        let category_ns = histogram.mean() * histogram.len() as f64;
        let share = if total_ns > 0.0 { category_ns / total_ns * 100.0 } else { 0.0 };
        println!(
            "{}: {:.1}% of recorded time\n  mean={:.3}ms, p95={:.3}ms, p99={:.3}ms, count={}, total={:.2}s",
            category.as_str(),
            share,
            histogram.mean() / 1_000_000.0,
            histogram.value_at_quantile(0.95) as f64 / 1_000_000.0,
            histogram.value_at_quantile(0.99) as f64 / 1_000_000.0,
            histogram.len(),
            category_ns / 1_000_000_000.0,
        );
    }

    println!("==================\n");
}
