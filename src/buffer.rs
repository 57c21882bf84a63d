//! Point records stored against a finalized layout.

use crate::{
    dimension::{self, DimensionId, Primitive},
    layout::DimensionDetail,
    Error, PointLayout, Result,
};
use std::sync::Arc;

/// The point buffers flowing out of a stage.
pub type PointViewSet = Vec<PointBuffer>;

/// A growable block of point records.
///
/// A buffer has a logical length (the number of points written so far) and a capacity it will
/// never grow past. Every access is checked: the dimension must be in the layout, the index must
/// be in range, and the Rust type must exactly match the dimension's registered type.
///
/// Setting a value at `index == len()` appends a new, zeroed point.
///
/// # Examples
///
/// ```
/// use las_pipeline::{dimension::{self, standard}, PointBuffer, PointTable};
/// let mut table = PointTable::new();
/// let intensity = dimension::id_of(standard::INTENSITY).unwrap();
/// table.layout_mut().add(intensity).unwrap();
/// let mut buffer = PointBuffer::new(table.finalize(), 2);
///
/// buffer.set(intensity, 0, 42u16).unwrap();
/// assert_eq!(1, buffer.len());
/// assert_eq!(42u16, buffer.get(intensity, 0).unwrap());
/// assert!(buffer.get::<u8>(intensity, 0).is_err());
/// assert!(buffer.get::<u16>(intensity, 1).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct PointBuffer {
    layout: Arc<PointLayout>,
    data: Vec<u8>,
    len: usize,
    capacity: usize,
}

impl PointBuffer {
    /// Creates an empty buffer that can hold up to `capacity` points.
    ///
    /// Memory is allocated as points are written, not up front.
    pub fn new(layout: Arc<PointLayout>, capacity: usize) -> PointBuffer {
        PointBuffer {
            layout,
            data: Vec::new(),
            len: 0,
            capacity,
        }
    }

    /// Returns this buffer's layout.
    pub fn layout(&self) -> &Arc<PointLayout> {
        &self.layout
    }

    /// Returns the number of points in this buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if this buffer holds no points.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the most points this buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raises the capacity by `additional` points.
    pub fn reserve(&mut self, additional: usize) {
        self.capacity = self.capacity.saturating_add(additional);
    }

    /// Returns a value.
    ///
    /// Fails with [Error::DimensionAbsent] if the dimension isn't in the layout,
    /// [Error::TypeMismatch] if `T` is not the dimension's type, and [Error::IndexOutOfRange] if
    /// `index >= len()`.
    pub fn get<T: Primitive>(&self, id: DimensionId, index: usize) -> Result<T> {
        let detail = self.detail::<T>(id)?;
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let start = self.position(index, detail);
        Ok(T::read(&self.data[start..start + detail.size()]))
    }

    /// Returns a value of any numeric type, widened to `f64`.
    ///
    /// Unlike [PointBuffer::get], this accepts any dimension type. Use it where a stage compares
    /// values numerically and doesn't care about the storage type.
    pub fn get_f64(&self, id: DimensionId, index: usize) -> Result<f64> {
        let detail = self.layout.dimension(id).ok_or_else(|| absent(id))?;
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let start = self.position(index, detail);
        Ok(dimension::read_as_f64(
            detail.ty,
            &self.data[start..start + detail.size()],
        ))
    }

    /// Sets a value.
    ///
    /// Setting at `index == len()` appends a point, as long as that doesn't exceed the capacity
    /// ([Error::CapacityExceeded]). Indices further past the end fail with
    /// [Error::IndexOutOfRange].
    pub fn set<T: Primitive>(&mut self, id: DimensionId, index: usize, value: T) -> Result<()> {
        let detail = self.detail::<T>(id)?;
        let (offset, size) = (detail.offset, detail.size());
        if index == self.len {
            self.push_zeroed()?;
        } else if index > self.len {
            return Err(if index >= self.capacity {
                Error::CapacityExceeded {
                    index,
                    capacity: self.capacity,
                }
            } else {
                Error::IndexOutOfRange {
                    index,
                    len: self.len,
                }
            });
        }
        let start = index * self.layout.point_size() + offset;
        value.write(&mut self.data[start..start + size]);
        Ok(())
    }

    /// Copies one point from another buffer with the same layout onto the end of this one.
    ///
    /// Returns the index of the new point.
    pub fn append_point_from(&mut self, other: &PointBuffer, index: usize) -> Result<usize> {
        if !Arc::ptr_eq(&self.layout, &other.layout) && self.layout != other.layout {
            return Err(Error::LayoutMismatch);
        }
        if index >= other.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: other.len,
            });
        }
        let size = self.layout.point_size();
        let new_index = self.len;
        self.push_zeroed()?;
        self.data[new_index * size..(new_index + 1) * size]
            .copy_from_slice(&other.data[index * size..(index + 1) * size]);
        Ok(new_index)
    }

    fn push_zeroed(&mut self) -> Result<()> {
        if self.len >= self.capacity {
            return Err(Error::CapacityExceeded {
                index: self.len,
                capacity: self.capacity,
            });
        }
        self.len += 1;
        self.data.resize(self.len * self.layout.point_size(), 0);
        Ok(())
    }

    fn detail<T: Primitive>(&self, id: DimensionId) -> Result<&DimensionDetail> {
        let detail = self.layout.dimension(id).ok_or_else(|| absent(id))?;
        if detail.ty == T::TYPE {
            Ok(detail)
        } else {
            Err(Error::TypeMismatch {
                name: detail.name.clone(),
                existing: detail.ty,
                requested: T::TYPE,
            })
        }
    }

    fn position(&self, index: usize, detail: &DimensionDetail) -> usize {
        index * self.layout.point_size() + detail.offset
    }
}

pub(crate) fn absent(id: DimensionId) -> Error {
    let name = dimension::info(id)
        .map(|info| info.name)
        .unwrap_or_else(|| id.to_string());
    Error::DimensionAbsent(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dimension::standard, PointTable};

    fn id(name: &str) -> DimensionId {
        dimension::id_of(name).unwrap()
    }

    fn buffer(capacity: usize) -> PointBuffer {
        let mut table = PointTable::new();
        for name in [standard::X, standard::CLASSIFICATION, standard::GPS_TIME] {
            let _ = table.layout_mut().add(id(name)).unwrap();
        }
        PointBuffer::new(table.finalize(), capacity)
    }

    #[test]
    fn append_and_read() {
        let mut buffer = buffer(3);
        buffer.set(id(standard::X), 0, -7i32).unwrap();
        buffer.set(id(standard::GPS_TIME), 0, 12.5f64).unwrap();
        buffer.set(id(standard::X), 1, 9i32).unwrap();
        assert_eq!(2, buffer.len());
        assert_eq!(-7, buffer.get::<i32>(id(standard::X), 0).unwrap());
        assert_eq!(12.5, buffer.get::<f64>(id(standard::GPS_TIME), 0).unwrap());
        assert_eq!(0., buffer.get::<f64>(id(standard::GPS_TIME), 1).unwrap());
        assert_eq!(0, buffer.get::<u8>(id(standard::CLASSIFICATION), 1).unwrap());
    }

    #[test]
    fn absent_dimension() {
        let buffer = buffer(1);
        assert!(matches!(
            buffer.get::<u16>(id(standard::INTENSITY), 0),
            Err(Error::DimensionAbsent(name)) if name == "Intensity"
        ));
    }

    #[test]
    fn type_mismatch_is_not_coerced() {
        let mut buffer = buffer(1);
        assert!(matches!(
            buffer.set(id(standard::X), 0, 1.0f64),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(buffer.is_empty());
    }

    #[test]
    fn index_out_of_range() {
        let mut buffer = buffer(4);
        assert!(matches!(
            buffer.get::<i32>(id(standard::X), 0),
            Err(Error::IndexOutOfRange { index: 0, len: 0 })
        ));
        assert!(matches!(
            buffer.set(id(standard::X), 2, 1i32),
            Err(Error::IndexOutOfRange { index: 2, len: 0 })
        ));
    }

    #[test]
    fn capacity_exceeded() {
        let mut buffer = buffer(1);
        buffer.set(id(standard::X), 0, 1i32).unwrap();
        assert!(matches!(
            buffer.set(id(standard::X), 1, 2i32),
            Err(Error::CapacityExceeded {
                index: 1,
                capacity: 1
            })
        ));
        buffer.reserve(1);
        buffer.set(id(standard::X), 1, 2i32).unwrap();
        assert_eq!(2, buffer.len());
    }

    #[test]
    fn widening_read() {
        let mut buffer = buffer(1);
        buffer.set(id(standard::CLASSIFICATION), 0, 2u8).unwrap();
        assert_eq!(2., buffer.get_f64(id(standard::CLASSIFICATION), 0).unwrap());
    }

    #[test]
    fn append_point_from() {
        let mut a = buffer(2);
        a.set(id(standard::X), 0, 1i32).unwrap();
        a.set(id(standard::X), 1, 2i32).unwrap();
        let mut b = PointBuffer::new(Arc::clone(a.layout()), 1);
        assert_eq!(0, b.append_point_from(&a, 1).unwrap());
        assert_eq!(2, b.get::<i32>(id(standard::X), 0).unwrap());
        assert!(b.append_point_from(&a, 0).is_err());
    }
}
