use crate::{
    object::ObjectId,
    path::Path,
    push_pop::PushPopType,
    search_result::SearchResult,
    story::Story,
    story_error::StoryError,
    value_type::ValueType,
};
use std::rc::Rc;

/// # Navigation
/// Methods to access specific sections of the story.
impl Story {
    /// Change the current position of the story to the given path. From
    /// here you can call [`cont()`](Story::cont) to evaluate the
    /// next line.
    ///
    /// The path string is a dot-separated path as used internally by the
    /// engine. These examples should work:
    ///
    /// ```ink
    ///    myKnot
    ///    myKnot.myStitch
    /// ```
    ///
    /// Labelled choices nested inside a weave are not always reachable
    /// this way.
    ///
    /// A path that doesn't exist from the root is looked up again from the
    /// story's current position, outwards through the enclosing knots, so
    /// `myStitch` reaches a stitch of the knot being played.
    ///
    /// Usually you reset the callstack beforehand, which discards any
    /// tunnels, threads or functions in progress. Passing `false` keeps
    /// them: only the innermost tunnel is redirected, and calling this
    /// from inside a function is an error.
    pub fn choose_path_string(
        &mut self,
        path: &str,
        reset_call_stack: bool,
        args: Option<&[ValueType]>,
    ) -> Result<(), StoryError> {
        self.if_async_we_cant("call ChoosePathString right now")?;

        // Resolved before the callstack reset clears the current position
        let target = self.resolve_host_path(path);

        if reset_call_stack {
            self.reset_callstack()?;
        } else {
            let callstack = self.get_state().get_callstack();
            let current = callstack.get_current_element();

            if current.push_pop_type == PushPopType::Function {
                let func_detail = current
                    .current_pointer
                    .container
                    .map(|c| format!("({})", self.graph.get_path(c)))
                    .unwrap_or_default();

                return Err(StoryError::InvalidStoryState(format!(
                    "Story was running a function {func_detail} when you called ChoosePathString({path}) - this is almost certainly not what you want! Full stack trace: \n{}",
                    callstack.get_callstack_trace(&self.graph)
                )));
            }
        }

        if let Some(args) = args {
            self.get_state_mut().pass_arguments_to_evaluation_stack(args)?;
        }

        tracing::debug!(path, target = %target, "choosing path");

        self.choose_path(&target, true)
    }

    fn resolve_host_path(&self, path: &str) -> Path {
        let path = Path::new_with_components_string(Some(path));

        if !self.graph.content_at_path(self.graph.root(), &path, 0, None).approximate {
            return path;
        }

        let state = self.get_state();
        let context = state
            .get_current_pointer()
            .container
            .or(state.get_previous_pointer().container);

        context
            .and_then(|c| self.graph.resolve_from(c, &path))
            .and_then(|found| found.correct_obj())
            .map(|id| self.graph.get_path(id))
            .unwrap_or(path)
    }

    /// Evaluates a function defined in ink, and gathers the (possibly
    /// multi-line) text the function produces while executing into
    /// `text_output`. The return value is what the function gave back with
    /// `~ return`, if anything.
    pub fn evaluate_function(
        &mut self,
        func_name: &str,
        args: &[ValueType],
        text_output: &mut String,
    ) -> Result<Option<ValueType>, StoryError> {
        self.if_async_we_cant("evaluate a function")?;

        if func_name.trim().is_empty() {
            return Err(StoryError::InvalidStoryState(
                "Function is empty or white space.".to_owned(),
            ));
        }

        let func_container = self
            .graph
            .knot_container_with_name(func_name)
            .ok_or_else(|| StoryError::BadArgument(format!("Function doesn't exist: '{func_name}'")))?;

        // Output of the main flow is kept aside while the function runs
        let output_stream_before = self.get_state().get_output_stream().to_vec();
        self.get_state_mut().reset_output(None);

        self.get_state_mut()
            .start_function_evaluation_from_host(func_container, args)?;

        let result = self.run_function_from_host(text_output);

        self.get_state_mut()
            .reset_output(Some(output_stream_before));

        result?;

        self.get_state_mut().complete_function_evaluation_from_host()
    }

    fn run_function_from_host(&mut self, text_output: &mut String) -> Result<(), StoryError> {
        while self.can_continue() {
            let text = self.cont()?;
            text_output.push_str(&text);
        }

        Ok(())
    }

    /// Whether the story has a knot or function with this name.
    pub fn has_function(&self, func_name: &str) -> bool {
        self.graph.knot_container_with_name(func_name).is_some()
    }

    /// Counts visits to the containers newly entered by a divert or a
    /// choice. Content reached by stepping is counted in `step` instead.
    pub(crate) fn visit_changed_containers_due_to_divert(&mut self) -> Result<(), StoryError> {
        let previous_pointer = self.get_state().get_previous_pointer();
        let pointer = self.get_state().get_current_pointer();

        // Only when pointing directly at a piece of content
        if pointer.is_null() || pointer.index == -1 {
            return Ok(());
        }

        let graph = Rc::clone(&self.graph);

        let mut prev_containers = std::mem::take(&mut self.prev_containers);
        prev_containers.clear();

        if !previous_pointer.is_null() {
            let mut prev_ancestor = previous_pointer
                .resolve(&graph)
                .filter(|id| graph.get_container(*id).is_some())
                .or(previous_pointer.container);

            while let Some(prev_anc) = prev_ancestor {
                prev_containers.push(prev_anc);
                prev_ancestor = graph.get_parent(prev_anc);
            }
        }

        let Some(mut current_child_of_container) = pointer.resolve(&graph) else {
            self.prev_containers = prev_containers;
            return Ok(());
        };

        let mut current_container_ancestor = graph.get_parent(current_child_of_container);
        let mut all_children_entered_at_start = true;

        while let Some(ancestor) = current_container_ancestor {
            let Some(container) = graph.get_container(ancestor) else {
                break;
            };

            if prev_containers.contains(&ancestor) && !container.counting_at_start_only {
                break;
            }

            // Entering at the start only when diverting straight to the
            // first leaf, not somewhere inside a container nested at index 0
            let entering_at_start = all_children_entered_at_start
                && container.content.first() == Some(&current_child_of_container);

            if !entering_at_start {
                all_children_entered_at_start = false;
            }

            self.visit_container(ancestor, entering_at_start)?;

            current_child_of_container = ancestor;
            current_container_ancestor = graph.get_parent(ancestor);
        }

        self.prev_containers = prev_containers;

        Ok(())
    }

    pub(crate) fn content_at_path(&self, path: &Path) -> SearchResult {
        self.graph.content_at_path(self.graph.root(), path, 0, None)
    }

    pub(crate) fn knot_container_with_name(&self, name: &str) -> Option<ObjectId> {
        self.graph.knot_container_with_name(name)
    }

    /// Gets the visit/read count of a particular `Container` at the given
    /// path. For a knot or stitch, that path string will be in the
    /// form:
    ///
    /// ```ink
    ///     knot
    ///     knot.stitch
    /// ```
    pub fn get_visit_count_at_path_string(&self, path_string: &str) -> Result<i32, StoryError> {
        self.get_state().visit_count_at_path_string(path_string)
    }
}
