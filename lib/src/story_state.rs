//! The mutable session: flows, evaluation stack, variables, counters and the
//! rules that assemble the output stream into text.
use std::{collections::HashMap, rc::Rc};

use rand::Rng;
use serde_json::{json, Map};

use crate::{
    callstack::CallStack,
    choice::Choice,
    control_command::CommandType,
    flow::Flow,
    json_read, json_write,
    list_definitions_origin::ListDefinitionsOrigin,
    object::{ContentGraph, ObjectId, RTObject},
    path::Path,
    pointer::{self, Pointer},
    push_pop::PushPopType,
    state_patch::StatePatch,
    story::INK_VERSION_CURRENT,
    story_error::{Document, StoryError},
    value_type::{StringValue, ValueType},
    variable_assigment::VariableAssignment,
    variables_state::VariablesState,
};

pub const INK_SAVE_STATE_VERSION: i32 = 10;
pub const MIN_COMPATIBLE_LOAD_VERSION: i32 = 8;

pub(crate) const DEFAULT_FLOW_NAME: &str = "DEFAULT_FLOW";

/// All the state of a story that changes while it runs, and that is saved
/// and loaded.
///
/// Cloning is cheap for the committed globals and counters, which are
/// shared until one of the copies writes to them.
#[derive(Clone)]
pub struct StoryState {
    graph: Rc<ContentGraph>,
    list_definitions: Rc<ListDefinitionsOrigin>,
    pub(crate) current_flow: Flow,
    /// Every flow other than the current one. `None` until a second flow is
    /// created.
    named_flows: Option<HashMap<String, Flow>>,
    pub(crate) variables_state: VariablesState,
    pub(crate) evaluation_stack: Vec<RTObject>,
    pub(crate) diverted_pointer: Pointer,
    visit_counts: Rc<HashMap<String, i32>>,
    turn_indices: Rc<HashMap<String, i32>>,
    pub(crate) current_turn_index: i32,
    pub(crate) story_seed: i32,
    pub(crate) previous_random: i32,
    pub(crate) did_safe_exit: bool,
    current_errors: Vec<String>,
    current_warnings: Vec<String>,
    current_text: Option<String>,
    current_tags: Option<Vec<String>>,
}

impl StoryState {
    pub(crate) fn new(graph: Rc<ContentGraph>, list_definitions: Rc<ListDefinitionsOrigin>) -> StoryState {
        let current_flow = Flow::new(DEFAULT_FLOW_NAME, &graph);

        // Seed random so that every play-through differs unless the host
        // decides otherwise
        let story_seed = rand::thread_rng().gen_range(0..100);

        let mut state = StoryState {
            variables_state: VariablesState::new(list_definitions.clone()),
            graph,
            list_definitions,
            current_flow,
            named_flows: None,
            evaluation_stack: Vec::new(),
            diverted_pointer: pointer::NULL,
            visit_counts: Rc::new(HashMap::new()),
            turn_indices: Rc::new(HashMap::new()),
            current_turn_index: -1,
            story_seed,
            previous_random: 0,
            did_safe_exit: false,
            current_errors: Vec::new(),
            current_warnings: Vec::new(),
            current_text: None,
            current_tags: None,
        };

        state.go_to_start();

        state
    }

    fn go_to_start(&mut self) {
        self.get_callstack_mut().get_current_element_mut().current_pointer =
            Pointer::start_of(self.graph.root());
    }

    pub(crate) fn graph(&self) -> &ContentGraph {
        &self.graph
    }

    pub fn can_continue(&self) -> bool {
        !self.get_current_pointer().is_null() && !self.has_error()
    }

    pub fn has_error(&self) -> bool {
        !self.current_errors.is_empty()
    }

    pub fn has_warning(&self) -> bool {
        !self.current_warnings.is_empty()
    }

    pub fn get_current_errors(&self) -> &[String] {
        &self.current_errors
    }

    pub fn get_current_warnings(&self) -> &[String] {
        &self.current_warnings
    }

    pub(crate) fn add_error(&mut self, message: String, is_warning: bool) {
        if is_warning {
            tracing::warn!("{message}");
            self.current_warnings.push(message);
        } else {
            tracing::error!("{message}");
            self.current_errors.push(message);
        }
    }

    pub(crate) fn reset_errors(&mut self) {
        self.current_errors.clear();
        self.current_warnings.clear();
    }

    pub(crate) fn take_errors(&mut self) -> (Vec<String>, Vec<String>) {
        (
            std::mem::take(&mut self.current_errors),
            std::mem::take(&mut self.current_warnings),
        )
    }

    /// Puts back errors taken from another copy of the state, without
    /// logging them a second time.
    pub(crate) fn append_errors(&mut self, (errors, warnings): (Vec<String>, Vec<String>)) {
        self.current_errors.extend(errors);
        self.current_warnings.extend(warnings);
    }

    pub fn get_variables_state(&self) -> &VariablesState {
        &self.variables_state
    }

    pub fn get_variables_state_mut(&mut self) -> &mut VariablesState {
        &mut self.variables_state
    }

    pub(crate) fn get_callstack(&self) -> &CallStack {
        &self.current_flow.callstack
    }

    pub(crate) fn get_callstack_mut(&mut self) -> &mut CallStack {
        &mut self.current_flow.callstack
    }

    pub fn get_current_pointer(&self) -> Pointer {
        self.get_callstack().get_current_element().current_pointer
    }

    pub(crate) fn set_current_pointer(&mut self, pointer: Pointer) {
        self.get_callstack_mut().get_current_element_mut().current_pointer = pointer;
    }

    pub(crate) fn get_previous_pointer(&self) -> Pointer {
        self.get_callstack().get_current_thread().previous_pointer
    }

    pub(crate) fn set_previous_pointer(&mut self, pointer: Pointer) {
        self.get_callstack_mut().get_current_thread_mut().previous_pointer = pointer;
    }

    pub(crate) fn get_in_expression_evaluation(&self) -> bool {
        self.get_callstack().get_current_element().in_expression_evaluation
    }

    pub(crate) fn set_in_expression_evaluation(&mut self, value: bool) {
        self.get_callstack_mut().get_current_element_mut().in_expression_evaluation = value;
    }

    pub fn get_current_turn_index(&self) -> i32 {
        self.current_turn_index
    }

    pub fn get_story_seed(&self) -> i32 {
        self.story_seed
    }

    pub fn set_story_seed(&mut self, seed: i32) {
        self.story_seed = seed;
        self.previous_random = 0;
    }

    /// Assigns through the variables state with access to the temporaries
    /// of the current flow.
    pub(crate) fn assign_variable(
        &mut self,
        var_ass: &VariableAssignment,
        value: ValueType,
    ) -> Result<(), StoryError> {
        self.variables_state
            .assign(&mut self.current_flow.callstack, var_ass, value)
    }

    pub(crate) fn get_variable_with_name(
        &self,
        name: &str,
        context_index: i32,
    ) -> Result<Option<ValueType>, StoryError> {
        self.variables_state
            .get_variable_with_name(&self.current_flow.callstack, name, context_index)
    }

    // Output stream

    pub(crate) fn get_output_stream(&self) -> &[RTObject] {
        &self.current_flow.output_stream
    }

    fn output_stream_dirty(&mut self) {
        self.current_text = None;
        self.current_tags = None;
    }

    pub(crate) fn reset_output(&mut self, objs: Option<Vec<RTObject>>) {
        self.current_flow.output_stream = objs.unwrap_or_default();
        self.output_stream_dirty();
    }

    pub(crate) fn in_string_evaluation(&self) -> bool {
        self.current_flow
            .output_stream
            .iter()
            .rev()
            .any(|o| o.is_command(CommandType::BeginString))
    }

    pub fn get_current_text(&mut self) -> String {
        if let Some(text) = &self.current_text {
            return text.clone();
        }

        let mut sb = String::new();
        let mut in_tag = false;

        for output_obj in self.current_flow.output_stream.iter() {
            match output_obj {
                RTObject::Value(ValueType::String(s)) if !in_tag => sb.push_str(&s.string),
                RTObject::ControlCommand(CommandType::BeginTag) => in_tag = true,
                RTObject::ControlCommand(CommandType::EndTag) => in_tag = false,
                _ => {}
            }
        }

        let text = Self::clean_output_whitespace(&sb);
        self.current_text = Some(text.clone());
        text
    }

    pub fn get_current_tags(&mut self) -> Vec<String> {
        if let Some(tags) = &self.current_tags {
            return tags.clone();
        }

        let mut tags = Vec::new();
        let mut in_tag = false;
        let mut sb = String::new();

        for output_obj in self.current_flow.output_stream.iter() {
            match output_obj {
                RTObject::ControlCommand(CommandType::BeginTag) => {
                    if in_tag && !sb.is_empty() {
                        tags.push(Self::clean_output_whitespace(&sb));
                        sb.clear();
                    }
                    in_tag = true;
                }
                RTObject::ControlCommand(CommandType::EndTag) => {
                    if !sb.is_empty() {
                        tags.push(Self::clean_output_whitespace(&sb));
                        sb.clear();
                    }
                    in_tag = false;
                }
                RTObject::Value(ValueType::String(s)) if in_tag => sb.push_str(&s.string),
                RTObject::Tag(tag) if !in_tag && !tag.get_text().is_empty() => {
                    tags.push(tag.get_text().to_string());
                }
                _ => {}
            }
        }

        if !sb.is_empty() {
            tags.push(Self::clean_output_whitespace(&sb));
        }

        self.current_tags = Some(tags.clone());
        tags
    }

    /// Collapses runs of inline whitespace into a single space and removes
    /// inline whitespace at the start and end of every line.
    pub(crate) fn clean_output_whitespace(input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut current_whitespace_start: Option<usize> = None;
        let mut start_of_line = 0;

        for (i, c) in input.char_indices() {
            let is_inline_whitespace = c == ' ' || c == '\t';

            if is_inline_whitespace && current_whitespace_start.is_none() {
                current_whitespace_start = Some(i);
            }

            if !is_inline_whitespace {
                if let Some(ws_start) = current_whitespace_start {
                    if c != '\n' && ws_start > 0 && ws_start != start_of_line {
                        result.push(' ');
                    }
                }
                current_whitespace_start = None;
            }

            if c == '\n' {
                start_of_line = i + 1;
            }

            if !is_inline_whitespace {
                result.push(c);
            }
        }

        result
    }

    pub(crate) fn output_stream_ends_in_newline(&self) -> bool {
        for obj in self.current_flow.output_stream.iter().rev() {
            match obj {
                RTObject::ControlCommand(_) => break,
                RTObject::Value(ValueType::String(text)) => {
                    if text.is_newline {
                        return true;
                    } else if text.is_non_whitespace() {
                        break;
                    }
                }
                _ => {}
            }
        }

        false
    }

    pub(crate) fn output_stream_contains_content(&self) -> bool {
        self.current_flow
            .output_stream
            .iter()
            .any(|o| o.as_string().is_some())
    }

    pub(crate) fn push_to_output_stream(&mut self, obj: RTObject) {
        if let RTObject::Value(ValueType::String(text)) = &obj {
            if let Some(list_text) = Self::try_splitting_head_tail_whitespace(&text.string) {
                for text_obj in list_text {
                    self.push_to_output_stream_individual(RTObject::Value(ValueType::String(text_obj)));
                }
                self.output_stream_dirty();
                return;
            }
        }

        self.push_to_output_stream_individual(obj);
        self.output_stream_dirty();
    }

    /// Splits leading and trailing newlines (with the inline whitespace
    /// around them) into their own string values, so that the newline rules
    /// apply to them. Returns `None` when there is nothing to split.
    fn try_splitting_head_tail_whitespace(s: &str) -> Option<Vec<StringValue>> {
        let bytes = s.as_bytes();

        let mut head_first_newline_idx: Option<usize> = None;
        let mut head_last_newline_idx: Option<usize> = None;
        for (i, &c) in bytes.iter().enumerate() {
            match c {
                b'\n' => {
                    head_first_newline_idx.get_or_insert(i);
                    head_last_newline_idx = Some(i);
                }
                b' ' | b'\t' => continue,
                _ => break,
            }
        }

        let mut tail_last_newline_idx: Option<usize> = None;
        let mut tail_first_newline_idx: Option<usize> = None;
        for (i, &c) in bytes.iter().enumerate().rev() {
            match c {
                b'\n' => {
                    tail_last_newline_idx.get_or_insert(i);
                    tail_first_newline_idx = Some(i);
                }
                b' ' | b'\t' => continue,
                _ => break,
            }
        }

        if head_first_newline_idx.is_none() && tail_last_newline_idx.is_none() {
            return None;
        }

        let mut list_texts = Vec::new();
        let mut inner_str_start = 0;
        let mut inner_str_end = s.len();

        if let (Some(head_first), Some(head_last)) = (head_first_newline_idx, head_last_newline_idx) {
            if head_first > 0 {
                list_texts.push(StringValue::new(&s[..head_first]));
            }
            list_texts.push(StringValue::new("\n"));
            inner_str_start = head_last + 1;
        }

        if let Some(tail_first) = tail_first_newline_idx {
            inner_str_end = tail_first;
        }

        if inner_str_end > inner_str_start {
            list_texts.push(StringValue::new(&s[inner_str_start..inner_str_end]));
        }

        if let (Some(tail_first), Some(tail_last)) = (tail_first_newline_idx, tail_last_newline_idx) {
            let after_head = head_last_newline_idx.map_or(true, |head_last| tail_first > head_last);

            if after_head {
                list_texts.push(StringValue::new("\n"));
                if tail_last < s.len() - 1 {
                    list_texts.push(StringValue::new(&s[tail_last + 1..]));
                }
            }
        }

        Some(list_texts)
    }

    fn push_to_output_stream_individual(&mut self, obj: RTObject) {
        let mut include_in_output = true;

        match &obj {
            RTObject::Glue => {
                // Glue cancels any newlines right before it. A second glue in
                // a row adds nothing.
                self.trim_newlines_from_output_stream();
                include_in_output = !matches!(self.current_flow.output_stream.last(), Some(RTObject::Glue));
            }
            RTObject::Value(ValueType::String(text)) => {
                // Where a function started writing, used to trim its
                // leading whitespace
                let mut function_trim_index: Option<usize> = None;
                let current_element = self.get_callstack().get_current_element();
                if current_element.push_pop_type == PushPopType::Function
                    && current_element.function_start_in_output_stream >= 0
                {
                    function_trim_index = Some(current_element.function_start_in_output_stream as usize);
                }

                // Where glue is, used to trim whitespace after it
                let mut glue_trim_index: Option<usize> = None;
                for (i, o) in self.current_flow.output_stream.iter().enumerate().rev() {
                    match o {
                        RTObject::Glue => {
                            glue_trim_index = Some(i);
                            break;
                        }
                        RTObject::ControlCommand(CommandType::BeginString) => {
                            if let Some(f) = function_trim_index {
                                if i >= f {
                                    function_trim_index = None;
                                }
                            }
                            break;
                        }
                        _ => {}
                    }
                }

                if glue_trim_index.is_some() || function_trim_index.is_some() {
                    if text.is_newline {
                        include_in_output = false;
                    } else if text.is_non_whitespace() {
                        if glue_trim_index.is_some() {
                            self.remove_existing_glue();
                        }

                        // Content has appeared, so the functions on the stack
                        // no longer need their leading whitespace trimmed
                        if function_trim_index.is_some() {
                            for element in self.get_callstack_mut().get_callstack_mut().iter_mut().rev() {
                                if element.push_pop_type == PushPopType::Function {
                                    element.function_start_in_output_stream = -1;
                                } else {
                                    break;
                                }
                            }
                        }
                    }
                } else if text.is_newline
                    && (self.output_stream_ends_in_newline() || !self.output_stream_contains_content())
                {
                    include_in_output = false;
                }
            }
            _ => {}
        }

        if include_in_output {
            self.current_flow.output_stream.push(obj);
            self.output_stream_dirty();
        }
    }

    fn trim_newlines_from_output_stream(&mut self) {
        let output_stream = &mut self.current_flow.output_stream;
        let mut remove_whitespace_from: Option<usize> = None;

        // Trailing newlines, possibly with inline whitespace between them
        for (i, obj) in output_stream.iter().enumerate().rev() {
            match obj {
                RTObject::ControlCommand(_) => break,
                RTObject::Value(ValueType::String(text)) if text.is_non_whitespace() => break,
                RTObject::Value(ValueType::String(text)) if text.is_newline => {
                    remove_whitespace_from = Some(i);
                }
                _ => {}
            }
        }

        if let Some(from) = remove_whitespace_from {
            let mut i = from;
            while i < output_stream.len() {
                if output_stream[i].as_string().is_some() {
                    output_stream.remove(i);
                } else {
                    i += 1;
                }
            }
        }

        self.output_stream_dirty();
    }

    fn remove_existing_glue(&mut self) {
        let output_stream = &mut self.current_flow.output_stream;

        let mut i = output_stream.len();
        while i > 0 {
            i -= 1;
            match output_stream[i] {
                RTObject::Glue => {
                    output_stream.remove(i);
                }
                RTObject::ControlCommand(_) => break,
                _ => {}
            }
        }

        self.output_stream_dirty();
    }

    pub(crate) fn pop_from_output_stream(&mut self, count: usize) {
        let len = self.current_flow.output_stream.len();
        self.current_flow.output_stream.truncate(len.saturating_sub(count));
        self.output_stream_dirty();
    }

    /// Removes the newlines and inline whitespace a function wrote at its end.
    fn trim_whitespace_from_function_end(&mut self) {
        debug_assert!(self.get_callstack().get_current_element().push_pop_type == PushPopType::Function);

        let function_start_point = self
            .get_callstack()
            .get_current_element()
            .function_start_in_output_stream
            .max(0) as usize;

        let output_stream = &mut self.current_flow.output_stream;
        let mut i = output_stream.len();
        while i > function_start_point {
            i -= 1;
            match &output_stream[i] {
                RTObject::ControlCommand(_) => break,
                RTObject::Value(ValueType::String(text)) => {
                    if text.is_newline || text.is_inline_whitespace {
                        output_stream.remove(i);
                    } else {
                        break;
                    }
                }
                _ => {}
            }
        }

        self.output_stream_dirty();
    }

    // Evaluation stack

    pub(crate) fn push_evaluation_stack(&mut self, mut obj: RTObject) {
        // Lists carry the names of their origins; resolve them to the
        // definitions of this story
        if let RTObject::Value(ValueType::List(list)) = &mut obj {
            list.resolve_origins(&self.list_definitions);
        }

        self.evaluation_stack.push(obj);
    }

    pub(crate) fn pop_evaluation_stack(&mut self) -> Result<RTObject, StoryError> {
        self.evaluation_stack.pop().ok_or_else(|| {
            StoryError::InvalidStoryState("Attempting to pop an empty evaluation stack".to_owned())
        })
    }

    pub(crate) fn pop_evaluation_stack_multiple(
        &mut self,
        number_of_objects: usize,
    ) -> Result<Vec<RTObject>, StoryError> {
        let len = self.evaluation_stack.len();
        if number_of_objects > len {
            return Err(StoryError::InvalidStoryState(format!(
                "Trying to pop {number_of_objects} objects from an evaluation stack holding {len}"
            )));
        }

        Ok(self.evaluation_stack.split_off(len - number_of_objects))
    }

    pub(crate) fn peek_evaluation_stack(&self) -> Option<&RTObject> {
        self.evaluation_stack.last()
    }

    // Call stack

    pub(crate) fn pop_callstack(&mut self, t: Option<PushPopType>) {
        // Functions trim the whitespace they leave at their end
        if self.get_callstack().get_current_element().push_pop_type == PushPopType::Function {
            self.trim_whitespace_from_function_end();
        }

        self.get_callstack_mut().pop(t);
    }

    pub(crate) fn try_exit_function_evaluation_from_host(&mut self) -> bool {
        if self.get_callstack().element_is_evaluate_from_host() {
            self.set_current_pointer(pointer::NULL);
            self.did_safe_exit = true;
            return true;
        }

        false
    }

    pub(crate) fn set_chosen_path(&mut self, path: &Path, incrementing_turn_index: bool) -> Result<(), StoryError> {
        // Changing direction, assume we need to clear current set of choices
        self.current_flow.current_choices.clear();

        let mut new_pointer = self.graph.pointer_at_path(path)?;
        if !new_pointer.is_null() && new_pointer.index == -1 {
            new_pointer.index = 0;
        }

        self.set_current_pointer(new_pointer);

        if incrementing_turn_index {
            self.current_turn_index += 1;
        }

        Ok(())
    }

    /// Abandons the current flow: the call stack goes back to its root, the
    /// pending choices are dropped and nothing is left to continue.
    pub fn force_end(&mut self) {
        self.get_callstack_mut().reset();
        self.current_flow.current_choices.clear();
        self.set_current_pointer(pointer::NULL);
        self.set_previous_pointer(pointer::NULL);
        self.did_safe_exit = true;
    }

    pub(crate) fn start_function_evaluation_from_host(
        &mut self,
        func_container: ObjectId,
        arguments: &[ValueType],
    ) -> Result<(), StoryError> {
        let height = self.evaluation_stack.len();
        self.get_callstack_mut()
            .push(PushPopType::FunctionEvaluationFromHost, height, 0);
        self.set_current_pointer(Pointer::start_of(func_container));

        self.pass_arguments_to_evaluation_stack(arguments)
    }

    pub(crate) fn pass_arguments_to_evaluation_stack(&mut self, arguments: &[ValueType]) -> Result<(), StoryError> {
        for arg in arguments {
            match arg {
                ValueType::Bool(_)
                | ValueType::Int(_)
                | ValueType::Float(_)
                | ValueType::String(_)
                | ValueType::List(_) => self.push_evaluation_stack(RTObject::Value(arg.clone())),
                other => {
                    return Err(StoryError::BadArgument(format!(
                        "ink arguments when calling EvaluateFunction / ChoosePathString must be int, float, string, bool or InkList. Argument was {other}"
                    )))
                }
            }
        }

        Ok(())
    }

    /// Pops the host evaluation frame and returns the value the function
    /// left on the evaluation stack, if any.
    pub(crate) fn complete_function_evaluation_from_host(&mut self) -> Result<Option<ValueType>, StoryError> {
        if self.get_callstack().get_current_element().push_pop_type != PushPopType::FunctionEvaluationFromHost {
            return Err(StoryError::InvalidStoryState(format!(
                "Expected external function evaluation to be complete. Stack trace: {}",
                self.get_callstack().get_callstack_trace(&self.graph)
            )));
        }

        let original_evaluation_stack_height = self
            .get_callstack()
            .get_current_element()
            .evaluation_stack_height_when_pushed;

        let mut returned_obj: Option<RTObject> = None;
        while self.evaluation_stack.len() > original_evaluation_stack_height {
            let popped_obj = self.pop_evaluation_stack()?;
            if returned_obj.is_none() {
                returned_obj = Some(popped_obj);
            }
        }

        self.get_callstack_mut()
            .pop(Some(PushPopType::FunctionEvaluationFromHost));

        match returned_obj {
            Some(RTObject::Value(ValueType::DivertTarget(p))) => Ok(Some(ValueType::new(p.to_string()))),
            Some(RTObject::Value(v)) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    // Choices

    /// The choices generated so far, including invisible defaults.
    pub(crate) fn get_generated_choices(&self) -> &[Choice] {
        &self.current_flow.current_choices
    }

    pub(crate) fn get_generated_choices_mut(&mut self) -> &mut Vec<Choice> {
        &mut self.current_flow.current_choices
    }

    // Visit and turn counts

    pub(crate) fn visit_count_for_container(&self, container_id: ObjectId) -> Result<i32, StoryError> {
        let container = self
            .graph
            .get_container(container_id)
            .ok_or_else(|| StoryError::InvalidStoryState("Read count target is not a container".to_owned()))?;

        if !container.visits_should_be_counted {
            return Err(StoryError::InvalidStoryState(format!(
                "Read count for target ({} - on {}) unknown. The story may need to be compiled with countAllVisits flag (-c).",
                container.name.as_deref().unwrap_or(""),
                self.graph.get_path(container_id)
            )));
        }

        if let Some(count) = self
            .variables_state
            .patch
            .as_ref()
            .and_then(|p| p.get_visit_count(container_id))
        {
            return Ok(count);
        }

        let path = self.graph.get_path(container_id).to_string();
        Ok(self.visit_counts.get(&path).copied().unwrap_or(0))
    }

    pub(crate) fn increment_visit_count_for_container(&mut self, container_id: ObjectId) -> Result<(), StoryError> {
        if self.variables_state.patch.is_some() {
            let count = self.visit_count_for_container(container_id)? + 1;
            if let Some(patch) = &mut self.variables_state.patch {
                patch.set_visit_count(container_id, count);
            }
            return Ok(());
        }

        let path = self.graph.get_path(container_id).to_string();
        *Rc::make_mut(&mut self.visit_counts).entry(path).or_insert(0) += 1;

        Ok(())
    }

    pub(crate) fn record_turn_index_visit_to_container(&mut self, container_id: ObjectId) {
        if let Some(patch) = &mut self.variables_state.patch {
            patch.set_turn_index(container_id, self.current_turn_index);
            return;
        }

        let path = self.graph.get_path(container_id).to_string();
        Rc::make_mut(&mut self.turn_indices).insert(path, self.current_turn_index);
    }

    pub(crate) fn turns_since_for_container(&self, container_id: ObjectId) -> Result<i32, StoryError> {
        let container = self
            .graph
            .get_container(container_id)
            .ok_or_else(|| StoryError::InvalidStoryState("TURNS_SINCE target is not a container".to_owned()))?;

        if !container.turn_index_should_be_counted {
            return Err(StoryError::InvalidStoryState(format!(
                "TURNS_SINCE() for target ({} - on {}) unknown. The story may need to be compiled with countAllVisits flag (-c).",
                container.name.as_deref().unwrap_or(""),
                self.graph.get_path(container_id)
            )));
        }

        if let Some(index) = self
            .variables_state
            .patch
            .as_ref()
            .and_then(|p| p.get_turn_index(container_id))
        {
            return Ok(self.current_turn_index - index);
        }

        let path = self.graph.get_path(container_id).to_string();
        match self.turn_indices.get(&path) {
            Some(index) => Ok(self.current_turn_index - index),
            None => Ok(-1),
        }
    }

    pub fn visit_count_at_path_string(&self, path_string: &str) -> Result<i32, StoryError> {
        if let Some(patch) = &self.variables_state.patch {
            let path = Path::new_with_components_string(Some(path_string));
            let container = self
                .graph
                .content_at_path(self.graph.root(), &path, 0, None)
                .correct_obj()
                .and_then(|id| self.graph.get_container(id).map(|_| id))
                .ok_or_else(|| {
                    StoryError::InvalidStoryState(format!("Content at path not found: {path_string}"))
                })?;

            if let Some(count) = patch.get_visit_count(container) {
                return Ok(count);
            }
        }

        Ok(self.visit_counts.get(path_string).copied().unwrap_or(0))
    }

    // Patching

    /// A copy of this state whose changes to globals and counters go to a
    /// fresh patch, leaving the committed values of both copies untouched.
    pub(crate) fn copy_and_start_patching(&self) -> StoryState {
        let mut copy = self.clone();
        copy.variables_state.patch = Some(StatePatch::new(self.variables_state.patch.as_ref()));
        tracing::debug!("started patching state");
        copy
    }

    /// Commits the pending patch, if any.
    pub(crate) fn apply_any_patch(&mut self) {
        let Some(patch) = self.variables_state.patch.take() else {
            return;
        };

        tracing::debug!(
            globals = patch.globals.len(),
            visits = patch.visit_counts.len(),
            turns = patch.turn_indices.len(),
            "applying state patch"
        );

        self.variables_state.apply_patch(&patch);

        for (container, count) in patch.visit_counts.iter() {
            let path = self.graph.get_path(*container).to_string();
            Rc::make_mut(&mut self.visit_counts).insert(path, *count);
        }

        for (container, index) in patch.turn_indices.iter() {
            let path = self.graph.get_path(*container).to_string();
            Rc::make_mut(&mut self.turn_indices).insert(path, *index);
        }
    }

    // Flows

    pub fn get_current_flow_name(&self) -> &str {
        &self.current_flow.name
    }

    pub fn current_flow_is_default_flow(&self) -> bool {
        self.current_flow.name == DEFAULT_FLOW_NAME
    }

    /// Names of the live flows other than the default one, sorted.
    pub fn get_alive_flow_names(&self) -> Vec<String> {
        let mut names: Vec<String> = match &self.named_flows {
            Some(named_flows) => named_flows
                .keys()
                .chain(std::iter::once(&self.current_flow.name))
                .filter(|name| *name != DEFAULT_FLOW_NAME)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        names.sort();
        names
    }

    pub(crate) fn switch_flow_internal(&mut self, flow_name: &str) {
        if flow_name == self.current_flow.name {
            return;
        }

        tracing::debug!(from = %self.current_flow.name, to = flow_name, "switching flow");

        let named_flows = self.named_flows.get_or_insert_with(HashMap::new);

        let mut next_flow = match named_flows.remove(flow_name) {
            Some(flow) => flow,
            None => Flow::new(flow_name, &self.graph),
        };

        std::mem::swap(&mut self.current_flow, &mut next_flow);
        named_flows.insert(next_flow.name.clone(), next_flow);

        self.output_stream_dirty();
    }

    pub(crate) fn switch_to_default_flow_internal(&mut self) {
        if self.named_flows.is_some() {
            self.switch_flow_internal(DEFAULT_FLOW_NAME);
        }
    }

    pub(crate) fn remove_flow_internal(&mut self, flow_name: &str) -> Result<(), StoryError> {
        if flow_name == DEFAULT_FLOW_NAME {
            return Err(StoryError::BadArgument("Cannot destroy default flow".to_owned()));
        }

        // If we're currently in the flow that's being removed, switch back to default
        if self.current_flow.name == flow_name {
            self.switch_to_default_flow_internal();
        }

        if let Some(named_flows) = &mut self.named_flows {
            named_flows.remove(flow_name);
        }

        tracing::debug!(flow = flow_name, "removed flow");

        Ok(())
    }

    // Save and load

    pub fn to_json(&self) -> Result<String, StoryError> {
        Ok(self.write_json()?.to_string())
    }

    pub fn load_json(&mut self, save_string: &str) -> Result<(), StoryError> {
        let value: serde_json::Value = serde_json::from_str(save_string)
            .map_err(|e| StoryError::BadJson(format!("State not in JSON format: {e}")))?;

        let j_object = value
            .as_object()
            .ok_or(StoryError::BadJson("State is not a JSON object".to_owned()))?;

        self.load_json_obj(j_object)
    }

    fn write_json(&self) -> Result<serde_json::Value, StoryError> {
        let mut obj: Map<String, serde_json::Value> = Map::new();

        let mut flows: Map<String, serde_json::Value> = Map::new();
        flows.insert(self.current_flow.name.clone(), self.current_flow.write_json(&self.graph)?);

        if let Some(named_flows) = &self.named_flows {
            for (name, flow) in named_flows {
                flows.insert(name.clone(), flow.write_json(&self.graph)?);
            }
        }

        obj.insert("flows".to_owned(), serde_json::Value::Object(flows));
        obj.insert("currentFlowName".to_owned(), json!(self.current_flow.name));
        obj.insert("variablesState".to_owned(), self.variables_state.write_json()?);
        obj.insert(
            "evalStack".to_owned(),
            json_write::write_list_rt_objs(&self.evaluation_stack)?,
        );

        if let Some(path) = self.diverted_pointer.get_path(&self.graph) {
            obj.insert("currentDivertTarget".to_owned(), json!(path.get_components_string()));
        }

        obj.insert("visitCounts".to_owned(), json_write::write_int_dictionary(&self.visit_counts));
        obj.insert("turnIndices".to_owned(), json_write::write_int_dictionary(&self.turn_indices));
        obj.insert("turnIdx".to_owned(), json!(self.current_turn_index));
        obj.insert("storySeed".to_owned(), json!(self.story_seed));
        obj.insert("previousRandom".to_owned(), json!(self.previous_random));
        obj.insert("inkSaveVersion".to_owned(), json!(INK_SAVE_STATE_VERSION));
        obj.insert("inkFormatVersion".to_owned(), json!(INK_VERSION_CURRENT));

        Ok(serde_json::Value::Object(obj))
    }

    /// Reads the whole document before touching `self`, so a failed load
    /// leaves the state as it was.
    fn load_json_obj(&mut self, j_object: &Map<String, serde_json::Value>) -> Result<(), StoryError> {
        let save_version = j_object
            .get("inkSaveVersion")
            .and_then(|v| v.as_i64())
            .ok_or(StoryError::BadJson("ink save format incorrect, can't load.".to_owned()))?;

        if save_version < MIN_COMPATIBLE_LOAD_VERSION as i64 {
            return Err(StoryError::IncompatibleVersion {
                document: Document::Save,
                found: save_version,
                minimum: MIN_COMPATIBLE_LOAD_VERSION,
                current: INK_SAVE_STATE_VERSION,
            });
        }

        let (current_flow, named_flows) = match j_object.get("flows") {
            Some(flows_obj) => self.load_flows(j_object, flows_obj)?,
            // Older saves hold a single flow at the top level
            None => {
                let mut flow = Flow::new(DEFAULT_FLOW_NAME, &self.graph);
                flow.callstack.load_json(
                    &self.graph,
                    j_object
                        .get("callstackThreads")
                        .and_then(|o| o.as_object())
                        .ok_or(StoryError::BadJson("loading callstack threads".to_owned()))?,
                )?;

                flow.output_stream = json_read::jarray_to_runtime_obj_list(
                    j_object
                        .get("outputStream")
                        .and_then(|o| o.as_array())
                        .ok_or(StoryError::BadJson("outputStream not found.".to_owned()))?,
                )?;

                flow.current_choices = j_object
                    .get("currentChoices")
                    .and_then(|o| o.as_array())
                    .ok_or(StoryError::BadJson("currentChoices not found.".to_owned()))?
                    .iter()
                    .map(json_read::jtoken_to_choice)
                    .collect::<Result<Vec<Choice>, StoryError>>()?;

                flow.load_flow_choice_threads(&self.graph, j_object.get("choiceThreads"))?;

                (flow, None)
            }
        };

        let mut variables_state = self.variables_state.clone();
        variables_state.patch = None;
        variables_state.load_json(
            j_object
                .get("variablesState")
                .and_then(|o| o.as_object())
                .ok_or(StoryError::BadJson("variablesState not found.".to_owned()))?,
        )?;

        let evaluation_stack = json_read::jarray_to_runtime_obj_list(
            j_object
                .get("evalStack")
                .and_then(|o| o.as_array())
                .ok_or(StoryError::BadJson("evalStack not found.".to_owned()))?,
        )?;

        let diverted_pointer = match j_object.get("currentDivertTarget").and_then(|o| o.as_str()) {
            Some(path) => self
                .graph
                .pointer_at_path(&Path::new_with_components_string(Some(path)))?,
            None => pointer::NULL,
        };

        let int_map = |key: &str| -> Result<HashMap<String, i32>, StoryError> {
            json_read::jobject_to_int_hashmap(
                j_object
                    .get(key)
                    .and_then(|o| o.as_object())
                    .ok_or_else(|| StoryError::BadJson(format!("{key} not found.")))?,
            )
        };
        let int_value = |key: &str| -> Result<i32, StoryError> {
            j_object
                .get(key)
                .and_then(|v| v.as_i64())
                .map(|v| v as i32)
                .ok_or_else(|| StoryError::BadJson(format!("{key} not found.")))
        };

        let visit_counts = int_map("visitCounts")?;
        let turn_indices = int_map("turnIndices")?;
        let current_turn_index = int_value("turnIdx")?;
        let story_seed = int_value("storySeed")?;
        // Some writers leave it out
        let previous_random = int_value("previousRandom").unwrap_or(0);

        self.current_flow = current_flow;
        self.named_flows = named_flows;
        self.variables_state = variables_state;
        self.evaluation_stack = evaluation_stack;
        self.diverted_pointer = diverted_pointer;
        self.visit_counts = Rc::new(visit_counts);
        self.turn_indices = Rc::new(turn_indices);
        self.current_turn_index = current_turn_index;
        self.story_seed = story_seed;
        self.previous_random = previous_random;
        self.output_stream_dirty();

        tracing::debug!(version = save_version, flow = %self.current_flow.name, "loaded state");

        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn load_flows(
        &self,
        j_object: &Map<String, serde_json::Value>,
        flows_obj: &serde_json::Value,
    ) -> Result<(Flow, Option<HashMap<String, Flow>>), StoryError> {
        let flows_obj_dict = flows_obj
            .as_object()
            .ok_or(StoryError::BadJson("Invalid flows object".to_owned()))?;

        let mut flows: HashMap<String, Flow> = HashMap::with_capacity(flows_obj_dict.len());
        for (name, flow_obj) in flows_obj_dict {
            let flow_obj = flow_obj
                .as_object()
                .ok_or_else(|| StoryError::BadJson(format!("Invalid flow '{name}'")))?;
            flows.insert(name.clone(), Flow::from_json(name, &self.graph, flow_obj)?);
        }

        if flows.len() == 1 {
            let (_, flow) = flows
                .drain()
                .next()
                .ok_or(StoryError::BadJson("No flows in save".to_owned()))?;
            return Ok((flow, None));
        }

        let current_flow_name = j_object
            .get("currentFlowName")
            .and_then(|n| n.as_str())
            .ok_or(StoryError::BadJson("currentFlowName not found.".to_owned()))?;

        let current_flow = flows.remove(current_flow_name).ok_or_else(|| {
            StoryError::BadJson(format!("Current flow '{current_flow_name}' not found in save"))
        })?;

        Ok((current_flow, Some(flows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{container::Container, object::ContentGraph};

    fn state() -> StoryState {
        let mut graph = ContentGraph::new();
        let root = graph.add(RTObject::Container(Container::new(None, 0)));
        graph.set_root(root);

        StoryState::new(
            Rc::new(graph),
            Rc::new(ListDefinitionsOrigin::new(Vec::new())),
        )
    }

    fn push_text(state: &mut StoryState, s: &str) {
        state.push_to_output_stream(RTObject::new_string(s));
    }

    #[test]
    fn whitespace_is_cleaned() {
        assert_eq!(StoryState::clean_output_whitespace("  a   b \t c  \n  d"), "a b c\nd");
        assert_eq!(StoryState::clean_output_whitespace("x\n"), "x\n");
    }

    #[test]
    fn newlines_are_not_repeated() {
        let mut s = state();

        // nothing to end yet
        push_text(&mut s, "\n");
        assert!(s.get_output_stream().is_empty());

        push_text(&mut s, "Hello");
        push_text(&mut s, "\n");
        push_text(&mut s, "\n");
        assert_eq!(s.get_current_text(), "Hello\n");
    }

    #[test]
    fn glue_joins_lines_and_is_idempotent() {
        let mut once = state();
        push_text(&mut once, "Hello");
        push_text(&mut once, "\n");
        once.push_to_output_stream(RTObject::Glue);
        push_text(&mut once, " world");

        let mut twice = state();
        push_text(&mut twice, "Hello");
        push_text(&mut twice, "\n");
        twice.push_to_output_stream(RTObject::Glue);
        twice.push_to_output_stream(RTObject::Glue);
        push_text(&mut twice, " world");

        assert_eq!(once.get_current_text(), "Hello world");
        assert_eq!(twice.get_current_text(), "Hello world");
        assert_eq!(once.get_output_stream().len(), twice.get_output_stream().len());
        assert!(!twice.get_output_stream().iter().any(|o| matches!(o, RTObject::Glue)));
    }

    #[test]
    fn head_and_tail_newlines_are_split() {
        let parts = StoryState::try_splitting_head_tail_whitespace("\n  a b  \n ").unwrap();
        let parts: Vec<&str> = parts.iter().map(|p| p.string.as_str()).collect();
        assert_eq!(parts, vec!["\n", "  a b  ", "\n", " "]);

        assert!(StoryState::try_splitting_head_tail_whitespace("a b").is_none());
    }

    #[test]
    fn tags_inside_and_outside_text() {
        let mut s = state();
        s.push_to_output_stream(RTObject::Tag(crate::tag::Tag::new("legacy")));
        push_text(&mut s, "Line");
        s.push_to_output_stream(RTObject::ControlCommand(CommandType::BeginTag));
        push_text(&mut s, "dyn  tag");
        s.push_to_output_stream(RTObject::ControlCommand(CommandType::EndTag));

        assert_eq!(s.get_current_text(), "Line");
        assert_eq!(s.get_current_tags(), vec!["legacy", "dyn tag"]);
    }

    #[test]
    fn save_and_load_keep_the_session() {
        let mut s = state();
        s.current_turn_index = 3;
        s.set_story_seed(42);
        push_text(&mut s, "Some text");
        s.switch_flow_internal("other");
        push_text(&mut s, "Other text");

        let saved = s.to_json().unwrap();

        let mut loaded = state();
        loaded.load_json(&saved).unwrap();

        assert_eq!(loaded.get_current_flow_name(), "other");
        assert_eq!(loaded.get_current_text(), "Other text");
        assert_eq!(loaded.get_alive_flow_names(), vec!["other"]);
        assert_eq!(loaded.current_turn_index, 3);
        assert_eq!(loaded.story_seed, 42);

        loaded.switch_to_default_flow_internal();
        assert_eq!(loaded.get_current_text(), "Some text");
    }

    #[test]
    fn old_or_broken_saves_are_rejected() {
        let mut s = state();
        s.current_turn_index = 7;

        assert!(s.load_json(r#"{"inkSaveVersion": 7}"#).is_err());
        assert!(s.load_json(r#"{"flows": {}}"#).is_err());
        assert!(s.load_json("not json").is_err());

        // a document missing its variables leaves the state untouched
        let mut doc: serde_json::Value = serde_json::from_str(&state().to_json().unwrap()).unwrap();
        doc.as_object_mut().unwrap().remove("variablesState");
        assert!(s.load_json(&doc.to_string()).is_err());
        assert_eq!(s.current_turn_index, 7);
    }

    #[test]
    fn popping_past_the_evaluation_stack_is_an_error() {
        let mut s = state();
        assert!(s.pop_evaluation_stack().is_err());

        s.push_evaluation_stack(RTObject::Value(ValueType::Int(1)));
        assert!(s.pop_evaluation_stack_multiple(2).is_err());
        assert_eq!(s.evaluation_stack.len(), 1);
        assert!(matches!(
            s.pop_evaluation_stack_multiple(1).unwrap().as_slice(),
            [RTObject::Value(ValueType::Int(1))]
        ));
    }

    #[test]
    fn removing_the_current_flow_goes_back_to_default() {
        let mut s = state();
        s.switch_flow_internal("side");
        assert!(!s.current_flow_is_default_flow());

        s.remove_flow_internal("side").unwrap();
        assert!(s.current_flow_is_default_flow());
        assert!(s.get_alive_flow_names().is_empty());
        assert!(s.remove_flow_internal(DEFAULT_FLOW_NAME).is_err());
    }
}
