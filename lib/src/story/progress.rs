use crate::{
    choice::Choice,
    control_command::CommandType,
    object::{ObjectId, RTObject},
    pointer::{self, Pointer},
    push_pop::PushPopType,
    story::{errors::ErrorType, OutputStateChange, Story},
    story_error::StoryError,
    value_type::ValueType,
};
use std::rc::Rc;
use web_time::Instant;

/// # Story Progress
/// Methods to move the story forwards.
impl Story {
    /// `true` if the story is not waiting for user input from
    /// [`choose_choice_index`](Story::choose_choice_index).
    pub fn can_continue(&self) -> bool {
        self.get_state().can_continue()
    }

    /// Continues the story for one line of content, if possible, and
    /// returns that line.
    pub fn cont(&mut self) -> Result<String, StoryError> {
        self.continue_async(0.0)?;
        self.get_current_text()
    }

    /// Continues the story until a choice or the end is reached, returning
    /// all the text produced along the way.
    pub fn continue_maximally(&mut self) -> Result<String, StoryError> {
        self.if_async_we_cant("ContinueMaximally")?;

        let mut sb = String::new();

        while self.can_continue() {
            sb.push_str(&self.cont()?);
        }

        Ok(sb)
    }

    /// Runs the story for at most `millisecs_limit_async` milliseconds, then
    /// returns even if the line isn't finished. Check
    /// [`async_continue_complete`](Story::async_continue_complete) to know
    /// whether more calls are needed. A limit of 0 means no limit.
    pub fn continue_async(&mut self, millisecs_limit_async: f32) -> Result<(), StoryError> {
        if !self.has_validated_externals {
            self.validate_external_bindings()?;
        }

        self.continue_internal(millisecs_limit_async)
    }

    /// `false` while a time limited [`continue_async`](Story::continue_async)
    /// still has work to do.
    pub fn async_continue_complete(&self) -> bool {
        !self.async_continue_active
    }

    pub(crate) fn if_async_we_cant(&self, activity_str: &str) -> Result<(), StoryError> {
        if self.async_continue_active {
            return Err(StoryError::InvalidStoryState(format!("Can't {}. Story is in the middle of a ContinueAsync(). Make more ContinueAsync() calls or a single Continue() call beforehand.", activity_str)));
        }

        Ok(())
    }

    pub(crate) fn continue_internal(&mut self, millisecs_limit_async: f32) -> Result<(), StoryError> {
        let is_async_time_limited = millisecs_limit_async > 0.0;

        self.recursive_continue_count += 1;

        // Starting either a full run or a time limited one
        if !self.async_continue_active {
            self.async_continue_active = is_async_time_limited;

            if !self.can_continue() {
                self.recursive_continue_count -= 1;
                return Err(StoryError::InvalidStoryState(
                    "Can't continue - should check can_continue before calling Continue".to_owned(),
                ));
            }

            self.get_state_mut().did_safe_exit = false;
            self.get_state_mut().reset_output(None);

            // Only the outermost continue batches variable notifications,
            // external functions may call back into ink
            if self.recursive_continue_count == 1 {
                self.get_state_mut()
                    .variables_state
                    .start_batch_observing_variable_changes();
            }
        } else if !is_async_time_limited {
            self.async_continue_active = false;
        }

        let duration_stopwatch = Instant::now();

        let mut output_stream_ends_in_newline = false;
        self.saw_lookahead_unsafe_function_after_new_line = false;

        loop {
            match self.continue_single_step() {
                Ok(r) => output_stream_ends_in_newline = r,
                Err(e) => {
                    self.add_error(&e.get_message(), false);
                    break;
                }
            }

            if output_stream_ends_in_newline {
                break;
            }

            if self.async_continue_active
                && duration_stopwatch.elapsed().as_secs_f64() * 1000.0 > millisecs_limit_async as f64
            {
                break;
            }

            if !self.can_continue() {
                break;
            }
        }

        // Finished the line, reached choices or the end, or failed. Running
        // out of time leaves everything as it is for the next call.
        if output_stream_ends_in_newline || !self.can_continue() {
            // Evaluated further than the newline?
            if self.state_snapshot_at_last_new_line.is_some() {
                self.restore_state_snapshot();
            }

            if !self.can_continue() {
                if self.get_state().get_callstack().can_pop_thread() {
                    self.add_error(
                        "Thread available to pop, threads should always be flat by the end of evaluation?",
                        false,
                    );
                }

                if self.get_state().get_generated_choices().is_empty()
                    && !self.get_state().did_safe_exit
                    && !self.get_state().has_error()
                {
                    let callstack = self.get_state().get_callstack();

                    let message = if callstack.can_pop_type(Some(PushPopType::Tunnel)) {
                        "unexpectedly reached end of content. Do you need a '->->' to return from a tunnel?"
                    } else if callstack.can_pop_type(Some(PushPopType::Function)) {
                        "unexpectedly reached end of content. Do you need a '~ return'?"
                    } else if !callstack.can_pop() {
                        "ran out of content. Do you need a '-> DONE' or '-> END'?"
                    } else {
                        "unexpectedly reached end of content for unknown reason. Please debug compiler!"
                    };

                    self.add_error(message, false);
                }
            }

            self.get_state_mut().did_safe_exit = false;
            self.saw_lookahead_unsafe_function_after_new_line = false;

            if self.recursive_continue_count == 1 {
                let changed = self
                    .get_state_mut()
                    .variables_state
                    .stop_batch_observing_variable_changes();

                for (variable_name, value) in changed {
                    self.notify_variable_changed(&variable_name, &value);
                }
            }

            self.async_continue_active = false;
        }

        self.recursive_continue_count -= 1;

        // Report what went wrong: errors raised while stepping as well as
        // the ones added directly
        if self.get_state().has_error() || self.get_state().has_warning() {
            match self.on_error.clone() {
                Some(on_err) => {
                    let (errors, warnings) = self.get_state_mut().take_errors();

                    for err in errors.iter() {
                        on_err.borrow_mut().error(err, ErrorType::Error);
                    }

                    for warning in warnings.iter() {
                        on_err.borrow_mut().error(warning, ErrorType::Warning);
                    }
                }
                None => return Err(StoryError::InvalidStoryState(self.errors_summary())),
            }
        }

        Ok(())
    }

    fn errors_summary(&self) -> String {
        let errors = self.get_state().get_current_errors();
        let warnings = self.get_state().get_current_warnings();

        let mut sb = String::from("Ink had ");

        if !errors.is_empty() {
            sb.push_str(&errors.len().to_string());
            sb.push_str(if errors.len() == 1 { " error" } else { " errors" });

            if !warnings.is_empty() {
                sb.push_str(" and ");
            }
        }

        if !warnings.is_empty() {
            sb.push_str(&warnings.len().to_string());
            sb.push_str(if warnings.len() == 1 { " warning" } else { " warnings" });
        }

        sb.push_str(". It is strongly suggested that you assign an error handler to story.onError. The first issue was: ");

        match errors.first().or(warnings.first()) {
            Some(first) => sb.push_str(first),
            None => sb.push_str("unknown"),
        }

        sb
    }

    /// One step of the story. Returns `true` when a finished line has been
    /// found.
    pub(crate) fn continue_single_step(&mut self) -> Result<bool, StoryError> {
        self.step()?;

        // Out of content with only an invisible default choice left?
        if !self.can_continue() && !self.get_state().get_callstack().element_is_evaluate_from_host() {
            self.try_follow_default_invisible_choice()?;
        }

        // Choice text is generated in string evaluation, never rewind there
        if !self.get_state().in_string_evaluation() {
            // There was a newline earlier: check whether it still ends the line
            if let Some(snapshot) = self.state_snapshot_at_last_new_line.as_mut() {
                let prev_text = snapshot.get_current_text();
                let prev_tag_count = snapshot.get_current_tags().len();

                let curr_text = self.state.get_current_text();
                let curr_tag_count = self.state.get_current_tags().len();

                let change = Story::calculate_newline_output_state_change(
                    &prev_text,
                    &curr_text,
                    prev_tag_count,
                    curr_tag_count,
                );

                if change == OutputStateChange::ExtendedBeyondNewline
                    || self.saw_lookahead_unsafe_function_after_new_line
                {
                    self.restore_state_snapshot();

                    return Ok(true);
                } else if change == OutputStateChange::NewlineRemoved {
                    // Glue removed the newline
                    self.discard_snapshot();
                }
            }

            if self.get_state().output_stream_ends_in_newline() {
                // Keep going in case glue or a choice follows, but be ready
                // to rewind to here
                if self.can_continue() {
                    if self.state_snapshot_at_last_new_line.is_none() {
                        self.state_snapshot();
                    }
                } else {
                    self.discard_snapshot();
                }
            }
        }

        Ok(false)
    }

    pub(crate) fn step(&mut self) -> Result<(), StoryError> {
        let graph = Rc::clone(&self.graph);
        let mut should_add_to_stream = true;

        let mut pointer = self.get_state().get_current_pointer();

        if pointer.is_null() {
            return Ok(());
        }

        // Step into containers until reaching their first real content
        let is_container = |id: &ObjectId| graph.get_container(*id).is_some();

        let mut container_to_enter = pointer.resolve(&graph).filter(is_container);

        while let Some(cte) = container_to_enter {
            self.visit_container(cte, true)?;

            // Empty, the most we can do is step past it
            if graph.get_container(cte).map_or(true, |c| c.content.is_empty()) {
                break;
            }

            pointer = Pointer::start_of(cte);
            container_to_enter = pointer.resolve(&graph).filter(is_container);
        }

        self.get_state_mut().set_current_pointer(pointer);

        let mut current_content_obj = pointer.resolve(&graph);

        let is_logic_or_flow_control = self.perform_logic_and_flow_control(current_content_obj)?;

        // Flow forced to end by the logic above
        if self.get_state().get_current_pointer().is_null() {
            return Ok(());
        }

        if is_logic_or_flow_control {
            should_add_to_stream = false;
        }

        if let Some(id) = current_content_obj {
            match graph.get(id) {
                // An empty container is its own content, skip it
                RTObject::Container(_) => should_add_to_stream = false,
                RTObject::ChoicePoint(choice_point) => {
                    if let Some(mut choice) = self.process_choice(choice_point, id)? {
                        choice.index = self
                            .get_state()
                            .get_generated_choices()
                            .iter()
                            .filter(|c| !c.is_invisible_default)
                            .count();
                        self.get_state_mut().get_generated_choices_mut().push(choice);
                    }

                    current_content_obj = None;
                    should_add_to_stream = false;
                }
                _ => {}
            }
        }

        if should_add_to_stream {
            if let Some(id) = current_content_obj {
                let mut obj = graph.get(id).clone();

                // A variable pointer gets pinned to the context it is read in
                if let RTObject::Value(ValueType::VariablePointer(var_pointer)) = &mut obj {
                    if var_pointer.context_index == -1 {
                        var_pointer.context_index = self
                            .get_state()
                            .get_callstack()
                            .context_for_variable_named(&var_pointer.variable_name)
                            as i32;
                    }
                }

                if self.get_state().get_in_expression_evaluation() {
                    self.get_state_mut().push_evaluation_stack(obj);
                } else {
                    self.get_state_mut().push_to_output_stream(obj);
                }
            }
        }

        self.next_content()?;

        // Threads start after the increment, so that returning from the
        // thread continues after this instruction
        if let Some(id) = current_content_obj {
            if graph.get(id).is_command(CommandType::StartThread) {
                self.get_state_mut().get_callstack_mut().push_thread();
            }
        }

        Ok(())
    }

    pub(crate) fn next_content(&mut self) -> Result<(), StoryError> {
        // The previous pointer is what divert visit counting compares with
        let cp = self.get_state().get_current_pointer();
        self.get_state_mut().set_previous_pointer(cp);

        if !self.get_state().diverted_pointer.is_null() {
            let dp = self.get_state().diverted_pointer;
            self.get_state_mut().set_current_pointer(dp);
            self.get_state_mut().diverted_pointer = pointer::NULL;

            self.visit_changed_containers_due_to_divert()?;

            if !self.get_state().get_current_pointer().is_null() {
                return Ok(());
            }

            // A divert to the end of a container, e.g. a conditional that
            // rejoins: fall through to the increment
        }

        let successful_pointer_increment = self.increment_content_pointer();

        // Ran out of content: leave a function or finish a thread
        if !successful_pointer_increment {
            let mut did_pop = false;

            if self
                .get_state()
                .get_callstack()
                .can_pop_type(Some(PushPopType::Function))
            {
                self.get_state_mut().pop_callstack(Some(PushPopType::Function));

                // The function fell off its end without returning, give the
                // evaluator something to pop
                if self.get_state().get_in_expression_evaluation() {
                    self.get_state_mut().push_evaluation_stack(RTObject::Void);
                }

                did_pop = true;
            } else if self.get_state().get_callstack().can_pop_thread() {
                self.get_state_mut().get_callstack_mut().pop_thread();

                did_pop = true;
            } else {
                self.get_state_mut().try_exit_function_evaluation_from_host();
            }

            // Step past the point where we last called out
            if did_pop && !self.get_state().get_current_pointer().is_null() {
                self.next_content()?;
            }
        }

        Ok(())
    }

    /// Moves to the next content, climbing out of every container whose
    /// end is reached. Returns `false` when there's nothing left to climb.
    pub(crate) fn increment_content_pointer(&mut self) -> bool {
        let graph = &self.graph;
        let mut successful_increment = true;

        let mut pointer = self.state.get_current_pointer();
        pointer.index += 1;

        let mut container = match pointer.container {
            Some(c) => c,
            None => return false,
        };

        let len_of = |c: ObjectId| graph.get_container(c).map_or(0, |c| c.content.len()) as i32;

        while pointer.index >= len_of(container) {
            successful_increment = false;

            let next_ancestor = match graph.get_parent(container) {
                Some(a) => a,
                None => break,
            };

            let index_in_ancestor = match graph
                .get_container(next_ancestor)
                .and_then(|a| a.content.iter().position(|c| *c == container))
            {
                Some(i) => i,
                None => break,
            };

            pointer = Pointer::new(Some(next_ancestor), index_in_ancestor as i32 + 1);
            container = next_ancestor;

            successful_increment = true;
        }

        if !successful_increment {
            pointer = pointer::NULL;
        }

        self.state.set_current_pointer(pointer);

        successful_increment
    }

    pub(crate) fn calculate_newline_output_state_change(
        prev_text: &str,
        curr_text: &str,
        prev_tag_count: usize,
        curr_tag_count: usize,
    ) -> OutputStateChange {
        let newline_still_exists = curr_text.len() >= prev_text.len()
            && !prev_text.is_empty()
            && curr_text.as_bytes().get(prev_text.len() - 1) == Some(&b'\n');

        if prev_tag_count == curr_tag_count && prev_text.len() == curr_text.len() && newline_still_exists {
            return OutputStateChange::NoChange;
        }

        if !newline_still_exists {
            return OutputStateChange::NewlineRemoved;
        }

        // A new tag starts a new line
        if curr_tag_count > prev_tag_count {
            return OutputStateChange::ExtendedBeyondNewline;
        }

        // New text: only spaces and tabs can still be followed by glue
        let extended = curr_text.as_bytes()[prev_text.len()..]
            .iter()
            .any(|c| *c != b' ' && *c != b'\t');

        if extended {
            OutputStateChange::ExtendedBeyondNewline
        } else {
            OutputStateChange::NoChange
        }
    }

    pub(crate) fn visit_container(&mut self, container_id: ObjectId, at_start: bool) -> Result<(), StoryError> {
        let (visits, turns, at_start_only) = match self.graph.get_container(container_id) {
            Some(c) => (
                c.visits_should_be_counted,
                c.turn_index_should_be_counted,
                c.counting_at_start_only,
            ),
            None => return Ok(()),
        };

        if !at_start_only || at_start {
            if visits {
                self.get_state_mut()
                    .increment_visit_count_for_container(container_id)?;
            }

            if turns {
                self.get_state_mut()
                    .record_turn_index_visit_to_container(container_id);
            }
        }

        Ok(())
    }

    /// The choices available at the current point of the story, without
    /// invisible defaults. Filled while continuing and complete once
    /// [`can_continue`](Story::can_continue) is `false`.
    pub fn get_current_choices(&self) -> Vec<&Choice> {
        self.get_state()
            .get_generated_choices()
            .iter()
            .filter(|c| !c.is_invisible_default)
            .collect()
    }

    /// The text produced by the last [`cont`](Story::cont).
    pub fn get_current_text(&mut self) -> Result<String, StoryError> {
        self.if_async_we_cant("call currentText since it's a work in progress")?;
        Ok(self.get_state_mut().get_current_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newline_state_changes() {
        assert_eq!(
            Story::calculate_newline_output_state_change("Hello\n", "Hello\n", 0, 0),
            OutputStateChange::NoChange
        );
        assert_eq!(
            Story::calculate_newline_output_state_change("Hello\n", "Hello world", 0, 0),
            OutputStateChange::NewlineRemoved
        );
        assert_eq!(
            Story::calculate_newline_output_state_change("Hello\n", "Hello\nWorld", 0, 0),
            OutputStateChange::ExtendedBeyondNewline
        );
        assert_eq!(
            Story::calculate_newline_output_state_change("Hello\n", "Hello\n  ", 0, 0),
            OutputStateChange::NoChange
        );
        assert_eq!(
            Story::calculate_newline_output_state_change("Hello\n", "Hello\n", 0, 1),
            OutputStateChange::ExtendedBeyondNewline
        );
    }
}
