use emi::config::TrackerConfig;
use emi::loan::NewLoan;
use emi::store::MemoryStore;
use emi::tracker::{today, LoanTracker};
use log::{error, info};
use simple_logger::SimpleLogger;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = TrackerConfig::default();
    SimpleLogger::new()
        .with_level(config.log_level)
        .init()
        .unwrap();

    let tracker = LoanTracker::new(Arc::new(MemoryStore::new()), config);
    let _following = tracker.follow();

    let as_of = today();
    let loans = [
        NewLoan::new("home", 2500000., 26500., as_of - chrono::Months::new(14), 120, 8.6),
        NewLoan::new("car", 600000., 12450., as_of - chrono::Months::new(50), 48, 9.2),
        NewLoan::new("phone", 60000., 5000., as_of, 12, 0.),
    ];
    for loan in loans {
        if let Err(e) = tracker.add_loan(loan).await {
            error!("{}", e);
        }
    }

    for view in tracker.views(as_of) {
        println!("{}", view);
    }

    let dashboard = tracker.dashboard(as_of);
    info!(
        "{} active, {} completed, ${:.2}/month, ${:.2} of ${:.2} paid",
        dashboard.active_count,
        dashboard.completed_count,
        dashboard.total_monthly,
        dashboard.total_paid,
        dashboard.total_contracted
    );
    info!(
        "this month: ${:.2} due, ${:.2} paid ({:.0}%)",
        dashboard.month.total, dashboard.month.paid, dashboard.month.progress
    );
    for view in &dashboard.upcoming {
        info!("upcoming: {} on {}", view.loan.name, view.next_payment_date);
    }
}

// verifies that types shared with the screens can cross threads
fn is_normal<T: Sized + Send + Sync + Unpin>() {}

#[test]
fn normal_types() {
    is_normal::<emi::loan::LoanView>();
    is_normal::<LoanTracker>();
}
