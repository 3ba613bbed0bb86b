//! Conversion recipes and the fixed-point executor.
//!
//! A [`Recipe`] turns weighted inputs into weighted outputs. Each execution
//! runs it at the largest scale the ledgers allow (`worst_io`), limited by
//! the scarcest input and the fullest non-dumpable output. The executor
//! repeats passes over all pending recipes until none makes progress, so
//! one recipe's output can feed another's input within the same step
//! regardless of registration order.

use log::warn;

use crate::RECIPE_EPSILON;
use crate::broker::BrokerId;
use crate::ledger::ResourceLedger;

// ---------------------------------------------------------------------------
// Ledger access
// ---------------------------------------------------------------------------

/// What a recipe needs from its craft while executing.
pub trait ResourceAccess {
    /// The ledger for `name`, created on first access.
    fn resource(&mut self, name: &str) -> &mut ResourceLedger;

    /// Accumulate `quantity` of a cure effect.
    fn cure(&mut self, name: &str, quantity: f64);
}

// ---------------------------------------------------------------------------
// Recipe entries
// ---------------------------------------------------------------------------

/// Secondary resource drawn when the primary input runs out.
#[derive(Debug, Clone, PartialEq)]
pub struct Substitute {
    pub resource: String,
    /// Units of the substitute per recipe unit.
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeInput {
    pub resource: String,
    /// Units consumed per recipe unit.
    pub quantity: f64,
    pub substitute: Option<Substitute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeOutput {
    pub resource: String,
    /// Units produced per recipe unit.
    pub quantity: f64,
    /// Excess may be discarded instead of throttling the recipe.
    pub dump: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeCure {
    pub cure: String,
    pub quantity: f64,
}

// ---------------------------------------------------------------------------
// Recipe
// ---------------------------------------------------------------------------

/// A one-step conversion rule.
///
/// Built with the consuming builder methods; entries with a non-positive
/// quantity are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub broker: BrokerId,
    pub inputs: Vec<RecipeInput>,
    pub outputs: Vec<RecipeOutput>,
    pub cures: Vec<RecipeCure>,
    /// Fraction still to execute, in `[0, 1]`.
    left: f64,
}

impl Recipe {
    pub fn new(broker: BrokerId) -> Self {
        Self {
            broker,
            inputs: Vec::new(),
            outputs: Vec::new(),
            cures: Vec::new(),
            left: 1.0,
        }
    }

    pub fn input(mut self, resource: &str, quantity: f64) -> Self {
        if quantity > 0.0 {
            self.inputs.push(RecipeInput {
                resource: resource.to_string(),
                quantity,
                substitute: None,
            });
        }
        self
    }

    /// An input drawn from `primary` first, then from `secondary` once the
    /// primary is exhausted.
    pub fn combined_input(
        mut self,
        primary: &str,
        primary_quantity: f64,
        secondary: &str,
        secondary_quantity: f64,
    ) -> Self {
        if primary_quantity > 0.0 {
            let substitute = (secondary_quantity > 0.0).then(|| Substitute {
                resource: secondary.to_string(),
                quantity: secondary_quantity,
            });
            self.inputs.push(RecipeInput {
                resource: primary.to_string(),
                quantity: primary_quantity,
                substitute,
            });
        }
        self
    }

    pub fn output(mut self, resource: &str, quantity: f64, dump: bool) -> Self {
        if quantity > 0.0 {
            self.outputs.push(RecipeOutput {
                resource: resource.to_string(),
                quantity,
                dump,
            });
        }
        self
    }

    pub fn cure(mut self, cure: &str, quantity: f64) -> Self {
        if quantity > 0.0 {
            self.cures.push(RecipeCure {
                cure: cure.to_string(),
                quantity,
            });
        }
        self
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn is_done(&self) -> bool {
        self.left <= RECIPE_EPSILON
    }

    /// Largest scale the inputs allow, in `[0, left]`.
    pub fn worst_input(&self, access: &mut dyn ResourceAccess) -> f64 {
        let mut worst = self.left;
        for input in &self.inputs {
            let primary = access.resource(&input.resource).available().max(0.0) / input.quantity;
            // A primary too low to make progress on its own hands over to the
            // substitute, leftovers included.
            let ratio = match &input.substitute {
                Some(sub) if primary <= RECIPE_EPSILON => {
                    access.resource(&sub.resource).available().max(0.0) / sub.quantity
                }
                _ => primary,
            };
            worst = worst.min(ratio);
        }
        worst.max(0.0).min(self.left)
    }

    /// Largest scale the non-dumpable outputs allow, in `[0, left]`.
    pub fn worst_output(&self, access: &mut dyn ResourceAccess) -> f64 {
        let mut worst = self.left;
        for output in self.outputs.iter().filter(|o| !o.dump) {
            let free = access.resource(&output.resource).free_capacity();
            worst = worst.min(free / output.quantity);
        }
        worst.max(0.0).min(self.left)
    }

    /// Run one execution at the current `worst_io` and return the fraction
    /// executed (0 when blocked or done).
    pub fn execute(&mut self, access: &mut dyn ResourceAccess) -> f64 {
        if self.is_done() {
            return 0.0;
        }
        let worst_io = self.worst_input(access).min(self.worst_output(access));
        if worst_io <= RECIPE_EPSILON {
            return 0.0;
        }

        for input in &self.inputs {
            let need = input.quantity * worst_io;
            match &input.substitute {
                None => access.resource(&input.resource).consume(need, self.broker),
                Some(sub) => {
                    let primary = access.resource(&input.resource);
                    let from_primary = need.min(primary.available().max(0.0));
                    if from_primary > 0.0 {
                        primary.consume(from_primary, self.broker);
                    }
                    let shortfall_units = (need - from_primary) / input.quantity;
                    if shortfall_units > 0.0 {
                        access
                            .resource(&sub.resource)
                            .consume(sub.quantity * shortfall_units, self.broker);
                    }
                }
            }
        }
        for output in &self.outputs {
            access
                .resource(&output.resource)
                .produce(output.quantity * worst_io, self.broker);
        }
        for cure in &self.cures {
            access.cure(&cure.cure, cure.quantity * worst_io);
        }

        self.left -= worst_io;
        worst_io
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Execute `recipes` until a full pass makes no progress, or `max_passes`
/// passes have run. Returns the number of passes.
pub fn execute_recipes(
    recipes: &mut [Recipe],
    access: &mut dyn ResourceAccess,
    max_passes: usize,
) -> usize {
    let mut passes = 0;
    loop {
        if passes >= max_passes {
            let pending = recipes.iter().filter(|r| !r.is_done()).count();
            warn!("recipe executor stopped after {passes} passes with {pending} recipes pending");
            break;
        }
        passes += 1;

        let mut progressed = false;
        for recipe in recipes.iter_mut() {
            if recipe.execute(access) > 0.0 {
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    passes
}

// ===========================================================================
// Tests
// ===========================================================================
