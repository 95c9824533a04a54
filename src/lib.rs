//! Download ERA5-Land monthly mean fields from the Copernicus Climate Data Store.

//
// Public API
//
pub use cds::{CdsClient, CdsConfig, JobStatus};
pub use downloader::{download, download_variables, Retrieve};
pub use errors::Era5Err;
pub use util::parse_year;
pub use variables::{
    select_variables, CompletedRequest, DataFormat, DownloadFormat, Hours, ProductType,
    VariableRequest, ERA5_LAND_MONTHLY_MEANS, VARIABLES,
};

//
// Internal only
//
mod cds;
mod downloader;
mod errors;
mod util;
mod variables;
