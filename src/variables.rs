//! The ERA5-Land variables we download and the requests sent for them.

use crate::errors::Era5Err;
use serde::Serialize;
use strum_macros::{EnumString, IntoStaticStr};

/// Dataset holding the monthly averaged ERA5-Land fields.
pub const ERA5_LAND_MONTHLY_MEANS: &str = "reanalysis-era5-land-monthly-means";

/// Product types offered by the monthly means dataset.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProductType {
    /// One field per month.
    MonthlyAveragedReanalysis,
    /// One field per month for each requested hour of the day.
    MonthlyAveragedReanalysisByHourOfDay,
}

/// Hours of the day requested for a variable.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Hours {
    /// 00:00 through 23:00.
    All,
    /// Only 00:00.
    Midnight,
}

impl Hours {
    fn to_strings(self) -> Vec<String> {
        let last_hour = match self {
            Hours::All => 23,
            Hours::Midnight => 0,
        };

        (0..=last_hour).map(|hour| format!("{:02}:00", hour)).collect()
    }
}

/// File format of the retrieved data.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DataFormat {
    /// WMO GRIB, also used as the file extension.
    Grib,
}

/// Packaging of the retrieved data.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DownloadFormat {
    /// A single file, not zipped.
    Unarchived,
}

/// A static description of one variable to download.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct VariableRequest {
    /// Name used to build the output file name.
    pub name: &'static str,
    /// Remote collection to query.
    pub dataset: &'static str,
    /// Product to request.
    pub product_type: ProductType,
    /// Variable name as known by the data store.
    pub variable: &'static str,
    /// Hours of the day to request.
    pub hours: Hours,
    /// Format of the output file.
    pub data_format: DataFormat,
    /// Packaging of the output file.
    pub download_format: DownloadFormat,
}

/// Everything we download, in download order.
///
/// Precipitation and solar radiation use the by-hour-of-day product at 00:00 because the plain
/// monthly averages for these are wrong in the archive from September 2022 to February 2024.
pub const VARIABLES: [VariableRequest; 5] = [
    VariableRequest {
        name: "t2mhourly",
        dataset: ERA5_LAND_MONTHLY_MEANS,
        product_type: ProductType::MonthlyAveragedReanalysisByHourOfDay,
        variable: "2m_temperature",
        hours: Hours::All,
        data_format: DataFormat::Grib,
        download_format: DownloadFormat::Unarchived,
    },
    VariableRequest {
        name: "t2m",
        dataset: ERA5_LAND_MONTHLY_MEANS,
        product_type: ProductType::MonthlyAveragedReanalysis,
        variable: "2m_temperature",
        hours: Hours::Midnight,
        data_format: DataFormat::Grib,
        download_format: DownloadFormat::Unarchived,
    },
    VariableRequest {
        name: "tdew",
        dataset: ERA5_LAND_MONTHLY_MEANS,
        product_type: ProductType::MonthlyAveragedReanalysis,
        variable: "2m_dewpoint_temperature",
        hours: Hours::Midnight,
        data_format: DataFormat::Grib,
        download_format: DownloadFormat::Unarchived,
    },
    VariableRequest {
        name: "precipitation",
        dataset: ERA5_LAND_MONTHLY_MEANS,
        product_type: ProductType::MonthlyAveragedReanalysisByHourOfDay,
        variable: "total_precipitation",
        hours: Hours::Midnight,
        data_format: DataFormat::Grib,
        download_format: DownloadFormat::Unarchived,
    },
    VariableRequest {
        name: "solar_radiation",
        dataset: ERA5_LAND_MONTHLY_MEANS,
        product_type: ProductType::MonthlyAveragedReanalysisByHourOfDay,
        variable: "surface_solar_radiation_downwards",
        hours: Hours::Midnight,
        data_format: DataFormat::Grib,
        download_format: DownloadFormat::Unarchived,
    },
];

/// The body of a retrieval, a descriptor with the years and months filled in.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct CompletedRequest {
    pub product_type: Vec<String>,
    pub variable: Vec<String>,
    pub time: Vec<String>,
    pub data_format: String,
    pub download_format: String,
    pub year: Vec<String>,
    pub month: Vec<String>,
}

impl VariableRequest {
    /// Fill in every year of `start_year..=end_year` and all twelve months.
    ///
    /// No check is made that the range is sane, an inverted range gives an empty year list.
    pub fn complete(&self, start_year: u32, end_year: u32) -> CompletedRequest {
        let product_type: &'static str = self.product_type.into();
        let data_format: &'static str = self.data_format.into();
        let download_format: &'static str = self.download_format.into();

        CompletedRequest {
            product_type: vec![product_type.to_owned()],
            variable: vec![self.variable.to_owned()],
            time: self.hours.to_strings(),
            data_format: data_format.to_owned(),
            download_format: download_format.to_owned(),
            year: (start_year..=end_year).map(|year| year.to_string()).collect(),
            month: (1..=12).map(|month| format!("{:02}", month)).collect(),
        }
    }

    /// e.g. `t2m_2000_2001.grib`
    pub fn file_name(&self, start_year: u32, end_year: u32) -> String {
        let extension: &'static str = self.data_format.into();
        format!("{}_{}_{}.{}", self.name, start_year, end_year, extension)
    }
}

/// Pick the named variables out of `VARIABLES`, keeping download order.
pub fn select_variables<S: AsRef<str>>(names: &[S]) -> Result<Vec<VariableRequest>, Era5Err> {
    if let Some(unknown) = names
        .iter()
        .map(AsRef::as_ref)
        .find(|name| !VARIABLES.iter().any(|var| var.name == *name))
    {
        let valid: Vec<&str> = VARIABLES.iter().map(|var| var.name).collect();
        return Err(Era5Err::UnknownVariable(format!(
            "{} (expected one of: {})",
            unknown,
            valid.join(", ")
        )));
    }

    Ok(VARIABLES
        .iter()
        .filter(|var| names.iter().any(|name| name.as_ref() == var.name))
        .copied()
        .collect())
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
