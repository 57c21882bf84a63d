//! The set of dimensions a point record carries in one pipeline run.

use crate::{
    dimension::{self, DimensionId, DimensionType},
    Error, Result,
};
use std::sync::Arc;

/// One dimension's place in a point record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DimensionDetail {
    /// The dimension's id.
    pub id: DimensionId,
    /// The dimension's name.
    pub name: String,
    /// The dimension's native type.
    pub ty: DimensionType,
    /// Byte offset of this dimension within a point record.
    pub offset: usize,
}

impl DimensionDetail {
    /// Returns the number of bytes this dimension occupies.
    pub fn size(&self) -> usize {
        self.ty.size()
    }
}

/// The dimensions of a point record and their byte offsets.
///
/// Stages add dimensions while the pipeline is being prepared. Dimensions are always kept in
/// registration (id) order and packed without gaps, so the same set of dimensions always produces
/// the same layout no matter which stage added what first. Once finalized, the layout can't
/// change.
///
/// # Examples
///
/// ```
/// use las_pipeline::{dimension::{self, standard}, PointLayout};
/// let mut layout = PointLayout::new();
/// let z = dimension::id_of(standard::Z).unwrap();
/// let x = dimension::id_of(standard::X).unwrap();
/// assert_eq!(0, layout.add(z).unwrap());
/// assert_eq!(0, layout.add(x).unwrap());
/// assert_eq!(Some(4), layout.offset(z));
/// layout.finalize();
/// assert!(layout.add(x).is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PointLayout {
    dimensions: Vec<DimensionDetail>,
    point_size: usize,
    finalized: bool,
}

impl PointLayout {
    /// Creates a new, empty layout.
    pub fn new() -> PointLayout {
        PointLayout::default()
    }

    /// Adds a registered dimension, returning its current byte offset.
    ///
    /// Adding a dimension that's already present is a no-op. The returned offset is provisional:
    /// adding a dimension with a lower id shifts everything after it. Offsets are fixed once the
    /// layout is finalized.
    pub fn add(&mut self, id: DimensionId) -> Result<usize> {
        let info = dimension::info(id).ok_or_else(|| Error::DimensionAbsent(id.to_string()))?;
        if let Some(detail) = self.dimension(id) {
            return Ok(detail.offset);
        }
        if self.finalized {
            return Err(Error::LayoutFinalized(info.name));
        }
        let position = self
            .dimensions
            .iter()
            .position(|detail| detail.id > id)
            .unwrap_or(self.dimensions.len());
        self.dimensions.insert(
            position,
            DimensionDetail {
                id,
                name: info.name,
                ty: info.ty,
                offset: 0,
            },
        );
        self.assign_offsets();
        Ok(self.dimensions[position].offset)
    }

    /// Registers a dimension and adds it to this layout, returning its id.
    ///
    /// # Examples
    ///
    /// ```
    /// use las_pipeline::{dimension::DimensionType, PointLayout};
    /// let mut layout = PointLayout::new();
    /// let id = layout.register("Temperature", DimensionType::F32).unwrap();
    /// assert!(layout.contains(id));
    /// ```
    pub fn register(&mut self, name: &str, ty: DimensionType) -> Result<DimensionId> {
        let id = dimension::register(name, ty)?;
        let _ = self.add(id)?;
        Ok(id)
    }

    /// Freezes this layout.
    pub fn finalize(&mut self) {
        if !self.finalized {
            log::debug!(
                "finalized point layout: {} dimensions, {} bytes per point",
                self.dimensions.len(),
                self.point_size
            );
        }
        self.finalized = true;
    }

    /// Returns true if this layout has been finalized.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Returns true if this layout holds the dimension.
    pub fn contains(&self, id: DimensionId) -> bool {
        self.dimension(id).is_some()
    }

    /// Returns the details for a dimension.
    pub fn dimension(&self, id: DimensionId) -> Option<&DimensionDetail> {
        self.dimensions
            .binary_search_by_key(&id, |detail| detail.id)
            .ok()
            .map(|i| &self.dimensions[i])
    }

    /// Finds a dimension by name.
    pub fn find(&self, name: &str) -> Option<&DimensionDetail> {
        self.dimensions.iter().find(|detail| detail.name == name)
    }

    /// Returns the byte offset of a dimension.
    pub fn offset(&self, id: DimensionId) -> Option<usize> {
        self.dimension(id).map(|detail| detail.offset)
    }

    /// Returns every dimension, in id order.
    pub fn dimensions(&self) -> &[DimensionDetail] {
        &self.dimensions
    }

    /// Returns the number of bytes in one point record.
    pub fn point_size(&self) -> usize {
        self.point_size
    }

    fn assign_offsets(&mut self) {
        let mut offset = 0;
        for detail in &mut self.dimensions {
            detail.offset = offset;
            offset += detail.size();
        }
        self.point_size = offset;
    }
}

/// Owns the point layout for one pipeline run.
///
/// While stages are being prepared the layout is mutable. Finalizing hands out a shared,
/// immutable copy that every point buffer of the run refers to.
#[derive(Debug, Default)]
pub struct PointTable {
    layout: PointLayout,
    shared: Option<Arc<PointLayout>>,
}

impl PointTable {
    /// Creates a table with an empty layout.
    pub fn new() -> PointTable {
        PointTable::default()
    }

    /// Returns the layout.
    pub fn layout(&self) -> &PointLayout {
        &self.layout
    }

    /// Returns the layout for adding dimensions.
    ///
    /// Adding to a finalized layout fails with [Error::LayoutFinalized].
    pub fn layout_mut(&mut self) -> &mut PointLayout {
        &mut self.layout
    }

    /// Finalizes the layout, returning the shared copy.
    ///
    /// Calling this more than once returns the same layout.
    pub fn finalize(&mut self) -> Arc<PointLayout> {
        if let Some(shared) = &self.shared {
            return Arc::clone(shared);
        }
        self.layout.finalize();
        let shared = Arc::new(self.layout.clone());
        self.shared = Some(Arc::clone(&shared));
        shared
    }

    /// Returns the finalized layout, if there is one.
    pub fn finalized(&self) -> Option<&Arc<PointLayout>> {
        self.shared.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::standard;

    fn id(name: &str) -> DimensionId {
        dimension::id_of(name).unwrap()
    }

    #[test]
    fn offsets_follow_registration_order() {
        let mut a = PointLayout::new();
        let _ = a.add(id(standard::GPS_TIME)).unwrap();
        let _ = a.add(id(standard::X)).unwrap();
        let _ = a.add(id(standard::INTENSITY)).unwrap();
        let mut b = PointLayout::new();
        let _ = b.add(id(standard::INTENSITY)).unwrap();
        let _ = b.add(id(standard::X)).unwrap();
        let _ = b.add(id(standard::GPS_TIME)).unwrap();
        a.finalize();
        b.finalize();
        assert_eq!(a, b);
        assert_eq!(Some(0), a.offset(id(standard::X)));
        assert_eq!(Some(4), a.offset(id(standard::INTENSITY)));
        assert_eq!(Some(6), a.offset(id(standard::GPS_TIME)));
        assert_eq!(14, a.point_size());
    }

    #[test]
    fn add_twice_is_a_noop() {
        let mut layout = PointLayout::new();
        let x = id(standard::X);
        assert_eq!(0, layout.add(x).unwrap());
        assert_eq!(0, layout.add(x).unwrap());
        assert_eq!(1, layout.dimensions().len());
    }

    #[test]
    fn finalized_rejects_new_dimensions() {
        let mut layout = PointLayout::new();
        let _ = layout.add(id(standard::X)).unwrap();
        layout.finalize();
        assert!(layout.add(id(standard::X)).is_ok());
        assert!(matches!(
            layout.add(id(standard::Y)),
            Err(Error::LayoutFinalized(name)) if name == "Y"
        ));
    }

    #[test]
    fn table_finalize_is_shared() {
        let mut table = PointTable::new();
        let _ = table.layout_mut().add(id(standard::Z)).unwrap();
        let a = table.finalize();
        let b = table.finalize();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(table.layout_mut().add(id(standard::Y)).is_err());
    }
}
