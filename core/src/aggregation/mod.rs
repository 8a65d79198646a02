pub mod device;
pub mod live;
pub mod report;

pub use device::{AggregateSet, DeviceAggregate};
pub use live::{DeviceRow, LiveFilter, LiveView, RssiBand, SortOrder, LIVE_ROW_LIMIT};
pub use report::{co_traveler_report, format_report_line, DistanceBin, ReportMode};
