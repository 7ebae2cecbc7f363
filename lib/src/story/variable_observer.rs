//! Callbacks notified when global variables change while the [`Story`] runs.
use std::{cell::RefCell, rc::Rc};

use crate::{story::Story, story_error::StoryError, value_type::ValueType};

/// Defines the method that will be called when an observed global variable
/// changes.
pub trait VariableObserver {
    fn changed(&mut self, variable_name: &str, value: &ValueType);
}

/// # Callbacks
/// Methods dealing with callback handlers.
impl Story {
    /// When the specified global variable changes its value, the observer
    /// will be called to notify it of the change. Changes made while the
    /// story continues are reported once, at the end of the
    /// [`cont`](Story::cont) call, with the final value. Changes made with
    /// [`set_variable`](Story::set_variable) are reported straight away.
    pub fn observe_variable(
        &mut self,
        variable_name: &str,
        observer: Rc<RefCell<dyn VariableObserver>>,
    ) -> Result<(), StoryError> {
        self.if_async_we_cant("observe a new variable")?;

        if !self
            .get_state()
            .variables_state
            .global_variable_exists_with_name(variable_name)
        {
            return Err(StoryError::BadArgument(format!(
                "Cannot observe variable '{variable_name}' because it wasn't declared in the ink story."
            )));
        }

        self.variable_observers
            .entry(variable_name.to_string())
            .or_default()
            .push(observer);

        Ok(())
    }

    /// Removes a variable observer, to stop getting variable change
    /// notifications. With a variable name only that subscription goes;
    /// with `None` the observer is removed from every variable.
    pub fn remove_variable_observer(
        &mut self,
        observer: &Rc<RefCell<dyn VariableObserver>>,
        specific_variable_name: Option<&str>,
    ) -> Result<(), StoryError> {
        self.if_async_we_cant("remove a variable observer")?;

        match specific_variable_name {
            Some(name) => {
                if let Some(v) = self.variable_observers.get_mut(name) {
                    v.retain(|x| !Rc::ptr_eq(x, observer));
                }
            }
            None => {
                for v in self.variable_observers.values_mut() {
                    v.retain(|x| !Rc::ptr_eq(x, observer));
                }
            }
        }

        self.variable_observers.retain(|_, v| !v.is_empty());

        Ok(())
    }

    pub(crate) fn notify_variable_changed(&self, variable_name: &str, value: &ValueType) {
        if let Some(observers) = self.variable_observers.get(variable_name) {
            for o in observers.iter() {
                o.borrow_mut().changed(variable_name, value);
            }
        }
    }
}
