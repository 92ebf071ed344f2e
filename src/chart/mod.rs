pub mod projection;
pub mod view;

pub use view::{ChartHandle, ChartHeader, ChartSink, DisplaySeries};
