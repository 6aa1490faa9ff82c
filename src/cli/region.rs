use regex::{Match, Regex};

use meep::Region;

/// Parse a region string of the form CONTIG[:START[-END]]
pub fn parse_region(reg_str: &str) -> anyhow::Result<Region> {
    let err = |s| Err(anyhow!("Could not parse region string '{}'", s));

    let parse_x = |s: Match| {
        parse_usize_with_commas(s.as_str())
            .ok_or_else(|| anyhow!("Could not parse coordinate in region '{}'", reg_str))
    };

    let reg = Regex::new(r#"^([^:]+):?([0-9,]+)?-?([0-9,]+)?$"#)?;
    let region = if let Some(cap) = reg.captures(reg_str) {
        match (cap.get(1), cap.get(2), cap.get(3)) {
            (Some(c), None, None) => Region::new(c.as_str(), None, None),
            (Some(c), Some(p), None) => Region::new(c.as_str(), Some(parse_x(p)?), None),
            (Some(c), Some(p), Some(q)) => {
                let (start, stop) = (parse_x(p)?, parse_x(q)?);
                if stop < start {
                    return Err(anyhow!("Invalid range - stop < start"));
                }
                Region::new(c.as_str(), Some(start), Some(stop))
            }
            _ => return err(reg_str),
        }
    } else {
        return err(reg_str);
    };
    debug!("Region: {}", region);
    Ok(region)
}

fn parse_usize_with_commas(s: &str) -> Option<usize> {
    s.replace(',', "").parse::<usize>().ok()
}
