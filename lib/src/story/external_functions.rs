use std::{cell::RefCell, collections::BTreeSet, rc::Rc};

use crate::{
    object::RTObject, pointer::Pointer, push_pop::PushPopType, story::Story,
    story_error::StoryError, value_type::ValueType,
};

/// Defines the method callback implementing an external function.
pub trait ExternalFunction {
    fn call(&mut self, func_name: &str, args: Vec<ValueType>) -> Option<ValueType>;
}

pub(crate) struct ExternalFunctionDef {
    function: Rc<RefCell<dyn ExternalFunction>>,
    lookahead_safe: bool,
}

/// # External Functions
/// Methods dealing with external function call handlers that will be called
/// while [`Story`] is processing.
impl Story {
    /// An ink file can provide a fallback function for when an `EXTERNAL`
    /// has been left unbound by the client, in which case the fallback will
    /// be called instead. Useful when testing a story in play-mode, when
    /// it's not possible to write a client-side external function, but when
    /// you don't want it to completely fail to run.
    pub fn set_allow_external_function_fallbacks(&mut self, v: bool) {
        self.allow_external_function_fallbacks = v;
    }

    /// Bind a Rust function to an ink `EXTERNAL` function declaration.
    ///
    /// Arguments:
    /// * `func_name` - The name of the function you're binding the handler to.
    /// * `function` - The handler that will be called whenever Ink runs that
    /// `EXTERNAL` function.
    /// * `lookahead_safe` - The engine often evaluates past the current line
    /// looking for glue, so a function may be called earlier than expected
    /// and the call may be rolled back. Pass `true` only when the function
    /// has no side effects and always returns the same result. Unsafe
    /// functions stop that lookahead instead.
    pub fn bind_external_function(
        &mut self,
        func_name: &str,
        function: Rc<RefCell<dyn ExternalFunction>>,
        lookahead_safe: bool,
    ) -> Result<(), StoryError> {
        self.if_async_we_cant("bind an external function")?;

        if self.externals.contains_key(func_name) {
            return Err(StoryError::BadArgument(format!(
                "Function '{func_name}' has already been bound."
            )));
        }

        self.externals.insert(
            func_name.to_string(),
            ExternalFunctionDef {
                function,
                lookahead_safe,
            },
        );

        Ok(())
    }

    /// Remove the binding for a named EXTERNAL ink function.
    pub fn unbind_external_function(&mut self, func_name: &str) -> Result<(), StoryError> {
        self.if_async_we_cant("unbind an external a function")?;

        if self.externals.remove(func_name).is_none() {
            return Err(StoryError::BadArgument(format!(
                "Function '{func_name}' has not been bound."
            )));
        }

        Ok(())
    }

    pub(crate) fn call_external_function(
        &mut self,
        func_name: &str,
        number_of_arguments: usize,
    ) -> Result<(), StoryError> {
        let (function, lookahead_safe) = match self.externals.get(func_name) {
            Some(def) => (Rc::clone(&def.function), def.lookahead_safe),
            None => return self.call_external_fallback(func_name),
        };

        if !lookahead_safe && self.get_state().in_string_evaluation() {
            // A rewind in the middle of string generation would leave the
            // evaluation stack without the function result
            return Err(StoryError::InvalidStoryState(format!("External function {func_name} could not be called because 1) it wasn't marked as lookaheadSafe when BindExternalFunction was called and 2) the story is in the middle of string generation, either because choice text is being generated, or because you have ink like \"hello {{func()}}\". You can work around this by generating the result of your function into a temporary variable before the string or choice gets generated: ~ temp x = {func_name}()")));
        }

        // Past a newline the call could be rolled back: stop the lookahead
        // and run it again once the line is done
        if !lookahead_safe && self.state_snapshot_at_last_new_line.is_some() {
            self.saw_lookahead_unsafe_function_after_new_line = true;
            return Ok(());
        }

        let popped = self
            .get_state_mut()
            .pop_evaluation_stack_multiple(number_of_arguments)?;

        let mut arguments: Vec<ValueType> = Vec::with_capacity(popped.len());
        for obj in popped {
            match obj {
                RTObject::Value(v) => arguments.push(v),
                _ => {
                    return Err(StoryError::InvalidStoryState(format!(
                        "Trying to call EXTERNAL function '{func_name}' with arguments which are not values."
                    )))
                }
            }
        }

        tracing::debug!(function = func_name, args = arguments.len(), "calling external function");

        let func_result = function.borrow_mut().call(func_name, arguments);

        let return_obj = match func_result {
            Some(ValueType::VariablePointer(_)) => {
                return Err(StoryError::InvalidStoryState(format!(
                    "Invalid return type from EXTERNAL function '{func_name}': variable pointers can't be returned"
                )))
            }
            Some(v) => RTObject::Value(v),
            None => RTObject::Void,
        };

        self.get_state_mut().push_evaluation_stack(return_obj);

        Ok(())
    }

    /// Unbound external: divert into the ink function of the same name, as
    /// if it had been called from ink.
    fn call_external_fallback(&mut self, func_name: &str) -> Result<(), StoryError> {
        if !self.allow_external_function_fallbacks {
            return Err(StoryError::InvalidStoryState(format!(
                "Trying to call EXTERNAL function '{func_name}' which has not been bound (and ink fallbacks disabled)."
            )));
        }

        let fallback_function_container = self.knot_container_with_name(func_name).ok_or_else(|| {
            StoryError::InvalidStoryState(format!(
                "Trying to call EXTERNAL function '{func_name}' which has not been bound, and fallback ink function could not be found."
            ))
        })?;

        let output_len = self.get_state().get_output_stream().len() as i32;
        self.get_state_mut()
            .get_callstack_mut()
            .push(PushPopType::Function, 0, output_len);
        self.get_state_mut().diverted_pointer = Pointer::start_of(fallback_function_container);

        Ok(())
    }

    /// Checks that every `EXTERNAL` called by the story is bound, or has an
    /// ink fallback when fallbacks are allowed.
    pub(crate) fn validate_external_bindings(&mut self) -> Result<(), StoryError> {
        let missing_externals: BTreeSet<String> = self
            .graph
            .iter()
            .filter_map(|(_, obj)| match obj {
                RTObject::Divert(divert) if divert.is_external => divert.get_raw_target_path(),
                _ => None,
            })
            .map(|path| path.get_components_string())
            .filter(|name| !self.externals.contains_key(name))
            .filter(|name| {
                !self.allow_external_function_fallbacks
                    || self.knot_container_with_name(name).is_none()
            })
            .collect();

        if !missing_externals.is_empty() {
            let join = missing_externals
                .iter()
                .cloned()
                .collect::<Vec<String>>()
                .join(", ");

            return Err(StoryError::InvalidStoryState(format!(
                "ERROR: Missing function binding for external{}: '{}' {}",
                if missing_externals.len() > 1 { "s" } else { "" },
                join,
                if self.allow_external_function_fallbacks {
                    ", and no fallback ink function found."
                } else {
                    " (ink fallbacks disabled)"
                }
            )));
        }

        self.has_validated_externals = true;

        Ok(())
    }
}
