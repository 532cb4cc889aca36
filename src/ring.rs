use crate::error::RingBufferError;

/// A sequence whose logical front can be rotated without moving elements.
///
/// Logical index `i` refers to the physical slot `(i + offset) % len`, so
/// [`forward`](Self::forward) and [`reverse`](Self::reverse) are O(1). Pushing
/// and popping work at the logical back and keep the current front in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingBuffer<T> {
  elements: Vec<T>,
  offset: usize,
}

impl<T> Default for RingBuffer<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> RingBuffer<T> {
  pub fn new() -> Self {
    Self {
      elements: Vec::new(),
      offset: 0,
    }
  }

  pub fn len(&self) -> usize {
    self.elements.len()
  }

  pub fn is_empty(&self) -> bool {
    self.elements.is_empty()
  }

  /// How far the front has been rotated from the first physical slot.
  /// Always less than `len()`, and zero when empty.
  pub fn offset(&self) -> usize {
    self.offset
  }

  /// Returns the element at logical `index`, wrapping around the length.
  /// `None` only when the buffer is empty.
  pub fn get(&self, index: usize) -> Option<&T> {
    let slot = self.slot(index)?;
    self.elements.get(slot)
  }

  pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
    let slot = self.slot(index)?;
    self.elements.get_mut(slot)
  }

  /// Moves the front forward by `distance` elements. Negative distances move
  /// it backward.
  ///
  /// # Errors
  /// Returns `RingBufferError::Empty` if there is nothing to rotate.
  pub fn forward(&mut self, distance: isize) -> Result<(), RingBufferError> {
    if self.elements.is_empty() {
      return Err(RingBufferError::Empty);
    }
    let len = self.elements.len() as isize;
    let shifted = (self.offset as isize).rem_euclid(len) + distance.rem_euclid(len);
    self.offset = shifted.rem_euclid(len) as usize;
    Ok(())
  }

  /// Moves the front backward by `distance` elements.
  ///
  /// # Errors
  /// Returns `RingBufferError::Empty` if there is nothing to rotate.
  pub fn reverse(&mut self, distance: isize) -> Result<(), RingBufferError> {
    self.forward(distance.wrapping_neg())
  }

  /// Appends an element at the logical back and returns the new length.
  pub fn push(&mut self, value: T) -> usize {
    self.normalize();
    self.elements.push(value);
    self.elements.len()
  }

  /// Removes the element at the logical back.
  pub fn pop(&mut self) -> Option<T> {
    self.normalize();
    self.elements.pop()
  }

  /// Removes every element and resets the offset.
  pub fn clear(&mut self) {
    self.elements.clear();
    self.offset = 0;
  }

  /// Iterates in logical order, starting at the current front.
  pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
    let (tail, head) = self.elements.split_at(self.offset);
    head.iter().chain(tail.iter())
  }

  /// Copies the elements out in logical order.
  pub fn to_vec(&self) -> Vec<T>
  where
    T: Clone,
  {
    self.iter().cloned().collect()
  }

  fn slot(&self, index: usize) -> Option<usize> {
    if self.elements.is_empty() {
      return None;
    }
    let len = self.elements.len();
    Some((index % len + self.offset) % len)
  }

  // Rotates storage so that physical order matches logical order.
  fn normalize(&mut self) {
    if self.offset != 0 {
      self.elements.rotate_left(self.offset);
      self.offset = 0;
    }
  }
}

impl<T> From<Vec<T>> for RingBuffer<T> {
  fn from(elements: Vec<T>) -> Self {
    Self { elements, offset: 0 }
  }
}

impl<T> FromIterator<T> for RingBuffer<T> {
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    Self::from(iter.into_iter().collect::<Vec<T>>())
  }
}

impl<T> Extend<T> for RingBuffer<T> {
  fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
    self.normalize();
    self.elements.extend(iter);
  }
}
