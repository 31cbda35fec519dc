//! The cart a buyer submits at checkout.
//!
//! The browser keeps the working cart; the server only ever sees it as an
//! immutable [`Cart`] built from the checkout payload.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::CheckoutError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Non-empty set of product lines, one line per product, ordered by product id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new<I>(lines: I) -> Result<Self, CheckoutError>
    where
        I: IntoIterator<Item = CartLine>,
    {
        let mut merged: BTreeMap<Uuid, i32> = BTreeMap::new();
        for line in lines {
            if line.quantity <= 0 {
                return Err(CheckoutError::InvalidQuantity {
                    product_id: line.product_id,
                    quantity: line.quantity,
                });
            }
            let entry = merged.entry(line.product_id).or_insert(0);
            *entry = entry
                .checked_add(line.quantity)
                .ok_or(CheckoutError::AmountOverflow)?;
        }

        if merged.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let lines = merged
            .into_iter()
            .map(|(product_id, quantity)| CartLine {
                product_id,
                quantity,
            })
            .collect();
        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.lines.iter().map(|line| line.product_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: Uuid, quantity: i32) -> CartLine {
        CartLine {
            product_id,
            quantity,
        }
    }

    #[test]
    fn empty_cart_is_rejected() {
        let err = Cart::new(Vec::new()).unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let id = Uuid::new_v4();
        let err = Cart::new(vec![line(id, 0)]).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InvalidQuantity { quantity: 0, .. }
        ));

        let err = Cart::new(vec![line(id, -3)]).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InvalidQuantity { quantity: -3, .. }
        ));
    }

    #[test]
    fn duplicate_products_are_merged() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let cart = Cart::new(vec![line(a, 2), line(b, 1), line(a, 3)]).unwrap();

        let merged: Vec<(Uuid, i32)> = cart
            .lines()
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect();
        let mut expected = vec![(a, 5), (b, 1)];
        expected.sort();
        assert_eq!(merged, expected);
    }

    #[test]
    fn line_order_does_not_depend_on_submission_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let forward = Cart::new(vec![line(a, 1), line(b, 2), line(c, 3)]).unwrap();
        let backward = Cart::new(vec![line(c, 3), line(b, 2), line(a, 1)]).unwrap();

        assert_eq!(forward, backward);
        let ids = forward.product_ids();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn merged_quantity_overflow_is_an_error() {
        let a = Uuid::new_v4();
        let err = Cart::new(vec![line(a, i32::MAX), line(a, 1)]).unwrap_err();
        assert!(matches!(err, CheckoutError::AmountOverflow));
    }
}
