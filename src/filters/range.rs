use crate::{
    dimension::DimensionId,
    stage::{Stage, StageKind},
    Error, Options, PointBuffer, PointLayout, PointViewSet, Result,
};
use std::{str::FromStr, sync::Arc};

/// A bound on one dimension, parsed from `Name[lo:hi]`.
///
/// Square brackets include the bound, parentheses exclude it, and either bound may be left
/// empty. A `!` after the name inverts the range.
///
/// # Examples
///
/// ```
/// use las_pipeline::filters::DimensionRange;
/// let range: DimensionRange = "Classification[2:2]".parse().unwrap();
/// assert!(range.contains(2.));
/// assert!(!range.contains(3.));
///
/// let range: DimensionRange = "Z(:100]".parse().unwrap();
/// assert!(range.contains(-1e9));
///
/// let range: DimensionRange = "Intensity![10:20)".parse().unwrap();
/// assert!(range.contains(20.));
/// assert!(!range.contains(10.));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DimensionRange {
    /// The dimension name.
    pub name: String,
    /// The lower bound, if any.
    pub lower: Option<f64>,
    /// The upper bound, if any.
    pub upper: Option<f64>,
    /// Does the range include its lower bound?
    pub lower_inclusive: bool,
    /// Does the range include its upper bound?
    pub upper_inclusive: bool,
    /// Does the range select values outside the bounds?
    pub negate: bool,
}

impl DimensionRange {
    /// Returns true if the value passes this range.
    pub fn contains(&self, value: f64) -> bool {
        let above = match self.lower {
            Some(lower) if self.lower_inclusive => value >= lower,
            Some(lower) => value > lower,
            None => true,
        };
        let below = match self.upper {
            Some(upper) if self.upper_inclusive => value <= upper,
            Some(upper) => value < upper,
            None => true,
        };
        (above && below) != self.negate
    }
}

impl FromStr for DimensionRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<DimensionRange> {
        let invalid = |reason: &str| Error::InvalidOption {
            option: "limits".to_string(),
            reason: format!("{}: {}", s, reason),
        };
        let s = s.trim();
        let open = s
            .find(['[', '('])
            .ok_or_else(|| invalid("missing [ or ("))?;
        let (name, bounds) = s.split_at(open);
        let (name, negate) = match name.trim().strip_suffix('!') {
            Some(name) => (name.trim(), true),
            None => (name.trim(), false),
        };
        if name.is_empty() {
            return Err(invalid("missing dimension name"));
        }
        let lower_inclusive = bounds.starts_with('[');
        let upper_inclusive = match bounds.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(invalid("missing ] or )")),
        };
        let (lower, upper) = bounds[1..bounds.len() - 1]
            .split_once(':')
            .ok_or_else(|| invalid("missing :"))?;
        let bound = |text: &str| -> Result<Option<f64>> {
            let text = text.trim();
            if text.is_empty() {
                Ok(None)
            } else {
                text.parse()
                    .map(Some)
                    .map_err(|_| invalid(&format!("{:?} is not a number", text)))
            }
        };
        Ok(DimensionRange {
            name: name.to_string(),
            lower: bound(lower)?,
            upper: bound(upper)?,
            lower_inclusive,
            upper_inclusive,
            negate,
        })
    }
}

/// Keeps the points that pass a set of ranges.
///
/// Ranges on the same dimension are alternatives, so a point passes if it's in any of them. Ranges
/// on different dimensions must all pass. Point order is kept.
///
/// # Options
///
/// - `limits`: comma-separated [DimensionRange]s, required.
///
/// Any other option is rejected.
#[derive(Debug)]
pub struct RangeFilter {
    options: Options,
    ranges: Vec<DimensionRange>,
    resolved: Vec<(DimensionId, Vec<DimensionRange>)>,
}

impl RangeFilter {
    /// The stage type name.
    pub const NAME: &'static str = "filters.range";

    /// Creates a range filter from its options.
    pub fn new(options: &Options) -> Result<RangeFilter> {
        options.check_known(RangeFilter::NAME, &["limits"])?;
        let ranges = options
            .get_str("limits")?
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<DimensionRange>>>()?;
        if ranges.is_empty() {
            return Err(Error::InvalidOption {
                option: "limits".to_string(),
                reason: "no ranges given".to_string(),
            });
        }
        Ok(RangeFilter {
            options: options.clone(),
            ranges,
            resolved: Vec::new(),
        })
    }

    /// Returns the parsed ranges.
    pub fn ranges(&self) -> &[DimensionRange] {
        &self.ranges
    }

    fn passes(&self, buffer: &PointBuffer, index: usize) -> Result<bool> {
        for (id, ranges) in &self.resolved {
            let value = buffer.get_f64(*id, index)?;
            if !ranges.iter().any(|range| range.contains(value)) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Stage for RangeFilter {
    fn name(&self) -> &str {
        RangeFilter::NAME
    }

    fn kind(&self) -> StageKind {
        StageKind::Filter
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn add_dimensions(&mut self, layout: &mut PointLayout) -> Result<()> {
        let mut resolved: Vec<(DimensionId, Vec<DimensionRange>)> = Vec::new();
        for range in &self.ranges {
            let id = layout
                .find(&range.name)
                .map(|detail| detail.id)
                .ok_or_else(|| Error::DimensionAbsent(range.name.clone()))?;
            match resolved.iter_mut().find(|(existing, _)| *existing == id) {
                Some((_, ranges)) => ranges.push(range.clone()),
                None => resolved.push((id, vec![range.clone()])),
            }
        }
        self.resolved = resolved;
        Ok(())
    }

    fn run(&mut self, views: PointViewSet, _: &Arc<PointLayout>) -> Result<PointViewSet> {
        let mut output = PointViewSet::with_capacity(views.len());
        for view in views {
            let mut kept = PointBuffer::new(Arc::clone(view.layout()), view.len());
            for index in 0..view.len() {
                if self.passes(&view, index)? {
                    let _ = kept.append_point_from(&view, index)?;
                }
            }
            log::debug!("kept {} of {} points", kept.len(), view.len());
            output.push(kept);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dimension::standard, PointTable};

    fn range(s: &str) -> DimensionRange {
        s.parse().unwrap()
    }

    #[test]
    fn parse() {
        assert_eq!(
            DimensionRange {
                name: "Z".to_string(),
                lower: Some(-1.5),
                upper: None,
                lower_inclusive: false,
                upper_inclusive: true,
                negate: false,
            },
            range(" Z(-1.5:] ")
        );
        assert!(range("Classification![7:7]").negate);
    }

    #[test]
    fn parse_errors() {
        for s in ["Z", "[1:2]", "Z[1:2", "Z[1 2]", "Z[a:2]"] {
            assert!(
                matches!(s.parse::<DimensionRange>(), Err(Error::InvalidOption { .. })),
                "{} parsed",
                s
            );
        }
    }

    #[test]
    fn filter() {
        let options = Options::new().with(
            "limits",
            "Classification[2:2],Classification[6:6],X[0:10)",
        );
        let mut filter = RangeFilter::new(&options).unwrap();
        let mut table = PointTable::new();
        let layout = table.layout_mut();
        let x = layout.register(standard::X, crate::dimension::DimensionType::I32).unwrap();
        let class = layout
            .register(standard::CLASSIFICATION, crate::dimension::DimensionType::U8)
            .unwrap();
        filter.add_dimensions(layout).unwrap();
        let layout = table.finalize();

        let mut buffer = PointBuffer::new(Arc::clone(&layout), 4);
        for (i, (xv, cv)) in [(1, 2u8), (2, 3), (10, 6), (3, 6)].into_iter().enumerate() {
            buffer.set(x, i, xv).unwrap();
            buffer.set(class, i, cv).unwrap();
        }
        let views = filter.run(vec![buffer], &layout).unwrap();
        assert_eq!(2, views[0].len());
        assert_eq!(1, views[0].get::<i32>(x, 0).unwrap());
        assert_eq!(3, views[0].get::<i32>(x, 1).unwrap());
    }

    #[test]
    fn absent_dimension() {
        let options = Options::new().with("limits", "Temperature[0:1]");
        let mut filter = RangeFilter::new(&options).unwrap();
        let mut layout = PointLayout::new();
        assert!(matches!(
            filter.add_dimensions(&mut layout),
            Err(Error::DimensionAbsent(name)) if name == "Temperature"
        ));
    }
}
