use crate::errors::Era5Err;

/// Parse a calendar year given on the command line.
pub fn parse_year(year_str: &str) -> Result<u32, Era5Err> {
    match year_str.trim().parse::<u32>() {
        Ok(year) if year > 0 => Ok(year),
        _ => Err(Era5Err::InvalidYear(year_str.to_owned())),
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
