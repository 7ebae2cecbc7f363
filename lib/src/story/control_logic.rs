use crate::{
    control_command::CommandType,
    divert::Divert,
    ink_list::InkList,
    native_function_call::Op,
    object::{ObjectId, RTObject},
    pointer,
    push_pop::PushPopType,
    story::Story,
    story_error::StoryError,
    story_state::StoryState,
    tag::Tag,
    value_type::ValueType,
    variable_assigment::VariableAssignment,
    variable_reference::VariableReference,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::rc::Rc;

/// # Control and Logic
/// Methods for performing logic and flow control.
impl Story {
    /// Runs the content at `content_obj` if it is logic or flow control.
    /// Returns `false` for plain content that still has to be output.
    pub(crate) fn perform_logic_and_flow_control(
        &mut self,
        content_obj: Option<ObjectId>,
    ) -> Result<bool, StoryError> {
        let id = match content_obj {
            Some(id) => id,
            None => return Ok(false),
        };

        let graph = Rc::clone(&self.graph);

        match graph.get(id) {
            RTObject::Divert(divert) => {
                self.perform_divert(divert, id)?;
                Ok(true)
            }
            RTObject::ControlCommand(command) => {
                self.perform_command(*command)?;
                Ok(true)
            }
            RTObject::VariableAssignment(var_ass) => {
                self.perform_variable_assignment(var_ass)?;
                Ok(true)
            }
            RTObject::VariableReference(var_ref) => {
                self.perform_variable_reference(var_ref, id)?;
                Ok(true)
            }
            RTObject::NativeFunctionCall(op) => {
                self.perform_native_function_call(*op)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn perform_divert(&mut self, divert: &Divert, own_id: ObjectId) -> Result<(), StoryError> {
        if divert.is_conditional {
            let condition = self.get_state_mut().pop_evaluation_stack()?;

            if !self.is_truthy(&condition)? {
                return Ok(());
            }
        }

        if let Some(var_name) = &divert.variable_divert_name {
            let var_contents = self
                .get_state()
                .get_variable_with_name(var_name, -1)?
                .ok_or_else(|| {
                    StoryError::InvalidStoryState(format!(
                        "Tried to divert using a target from a variable that could not be found ({})",
                        var_name
                    ))
                })?;

            match var_contents {
                ValueType::DivertTarget(target) => {
                    let p = self.graph.pointer_at_path(&target)?;
                    self.get_state_mut().diverted_pointer = p;
                }
                ValueType::Int(0) => {
                    return Err(StoryError::InvalidStoryState(format!(
                        "Tried to divert to a target from a variable, but the variable ({}) didn't contain a divert target, it was empty/null (the value 0).",
                        var_name
                    )));
                }
                other => {
                    return Err(StoryError::InvalidStoryState(format!(
                        "Tried to divert to a target from a variable, but the variable ({}) didn't contain a divert target, it contained '{}'.",
                        var_name, other
                    )));
                }
            }
        } else if divert.is_external {
            let func_name = divert
                .get_raw_target_path()
                .map(|p| p.get_components_string())
                .unwrap_or_default();

            return self.call_external_function(&func_name, divert.external_args);
        } else {
            let target = divert.get_target_pointer(&self.graph, own_id);
            self.get_state_mut().diverted_pointer = target;
        }

        if divert.pushes_to_stack {
            let output_len = self.get_state().get_output_stream().len() as i32;
            self.get_state_mut()
                .get_callstack_mut()
                .push(divert.stack_push_type, 0, output_len);
        }

        if self.get_state().diverted_pointer.is_null() {
            return Err(StoryError::InvalidStoryState(format!(
                "Divert resolution failed: {}",
                divert
            )));
        }

        Ok(())
    }

    fn perform_command(&mut self, command: CommandType) -> Result<(), StoryError> {
        match command {
            CommandType::EvalStart => {
                if self.get_state().get_in_expression_evaluation() {
                    return Err(StoryError::InvalidStoryState(
                        "Already in expression evaluation?".to_owned(),
                    ));
                }

                self.get_state_mut().set_in_expression_evaluation(true);
            }
            CommandType::EvalOutput => {
                // An empty expression leaves nothing on the stack
                if !self.get_state().evaluation_stack.is_empty() {
                    // Functions may evaluate to void, which prints nothing
                    match self.get_state_mut().pop_evaluation_stack()? {
                        RTObject::Void => {}
                        RTObject::Value(v) => {
                            self.get_state_mut()
                                .push_to_output_stream(RTObject::new_string(&v.to_string()));
                        }
                        other => {
                            self.get_state_mut()
                                .push_to_output_stream(RTObject::new_string(&other.to_string()));
                        }
                    }
                }
            }
            CommandType::EvalEnd => {
                if !self.get_state().get_in_expression_evaluation() {
                    return Err(StoryError::InvalidStoryState(
                        "Not in expression evaluation mode".to_owned(),
                    ));
                }

                self.get_state_mut().set_in_expression_evaluation(false);
            }
            CommandType::Duplicate => {
                let obj = self
                    .get_state()
                    .peek_evaluation_stack()
                    .cloned()
                    .ok_or_else(|| StoryError::InvalidStoryState("Nothing to duplicate".to_owned()))?;

                self.get_state_mut().push_evaluation_stack(obj);
            }
            CommandType::PopEvaluatedValue => {
                self.get_state_mut().pop_evaluation_stack()?;
            }
            CommandType::PopFunction | CommandType::PopTunnel => self.perform_pop(command)?,
            CommandType::BeginString => {
                self.get_state_mut()
                    .push_to_output_stream(RTObject::ControlCommand(command));

                if !self.get_state().get_in_expression_evaluation() {
                    return Err(StoryError::InvalidStoryState(
                        "Expected to be in an expression when evaluating a string".to_owned(),
                    ));
                }

                self.get_state_mut().set_in_expression_evaluation(false);
            }
            CommandType::EndString => self.perform_end_string(),
            CommandType::NoOp => {}
            CommandType::ChoiceCount => {
                let choice_count = self.get_state().get_generated_choices().len() as i32;
                self.get_state_mut()
                    .push_evaluation_stack(RTObject::Value(ValueType::Int(choice_count)));
            }
            CommandType::Turns => {
                let current_turn = self.get_state().current_turn_index;
                self.get_state_mut()
                    .push_evaluation_stack(RTObject::Value(ValueType::Int(current_turn + 1)));
            }
            CommandType::TurnsSince | CommandType::ReadCount => self.perform_count_query(command)?,
            CommandType::Random => {
                let max_int = match self.get_state_mut().pop_evaluation_stack()? {
                    RTObject::Value(ValueType::Int(v)) => v,
                    _ => {
                        return Err(StoryError::InvalidStoryState(
                            "Invalid value for the maximum parameter of RANDOM(min, max)".to_owned(),
                        ))
                    }
                };

                let min_int = match self.get_state_mut().pop_evaluation_stack()? {
                    RTObject::Value(ValueType::Int(v)) => v,
                    _ => {
                        return Err(StoryError::InvalidStoryState(
                            "Invalid value for the minimum parameter of RANDOM(min, max)".to_owned(),
                        ))
                    }
                };

                // Wide enough for RANDOM(-2147483648, 2147483647)
                let random_range = max_int as i64 - min_int as i64 + 1;
                if random_range <= 0 {
                    return Err(StoryError::InvalidStoryState(format!(
                        "RANDOM was called with minimum as {} and maximum as {}. The maximum must be larger",
                        min_int, max_int
                    )));
                }

                let next_random = self.next_random();
                let chosen_value = (next_random as i64 % random_range + min_int as i64) as i32;

                self.get_state_mut()
                    .push_evaluation_stack(RTObject::Value(ValueType::Int(chosen_value)));
                self.get_state_mut().previous_random = next_random;
            }
            CommandType::SeedRandom => {
                let seed = match self.get_state_mut().pop_evaluation_stack()? {
                    RTObject::Value(ValueType::Int(v)) => v,
                    _ => {
                        return Err(StoryError::InvalidStoryState(
                            "Invalid value passed to SEED_RANDOM".to_owned(),
                        ))
                    }
                };

                // Affects both RANDOM and shuffle sequences
                self.get_state_mut().story_seed = seed;
                self.get_state_mut().previous_random = 0;

                // SEED_RANDOM returns nothing
                self.get_state_mut().push_evaluation_stack(RTObject::Void);
            }
            CommandType::VisitIndex => {
                let container = self.get_state().get_current_pointer().container.ok_or_else(|| {
                    StoryError::InvalidStoryState("Visit index outside of a container".to_owned())
                })?;

                // index, not count
                let count = self.get_state().visit_count_for_container(container)? - 1;
                self.get_state_mut()
                    .push_evaluation_stack(RTObject::Value(ValueType::Int(count)));
            }
            CommandType::SequenceShuffleIndex => {
                let shuffle_index = self.next_sequence_shuffle_index()?;
                self.get_state_mut()
                    .push_evaluation_stack(RTObject::Value(ValueType::Int(shuffle_index)));
            }
            CommandType::StartThread => {
                // Done in step, after the pointer moved on
            }
            CommandType::Done => {
                // Either the end of a thread or a safe stop of the flow
                if self.get_state().get_callstack().can_pop_thread() {
                    self.get_state_mut().get_callstack_mut().pop_thread();
                } else {
                    self.get_state_mut().did_safe_exit = true;
                    self.get_state_mut().set_current_pointer(pointer::NULL);
                }
            }
            CommandType::End => self.get_state_mut().force_end(),
            CommandType::ListFromInt => self.perform_list_from_int()?,
            CommandType::ListRange => {
                let max = self.get_state_mut().pop_evaluation_stack()?;
                let min = self.get_state_mut().pop_evaluation_stack()?;
                let target = self.get_state_mut().pop_evaluation_stack()?;

                let result = match (target, min, max) {
                    (
                        RTObject::Value(ValueType::List(target_list)),
                        RTObject::Value(min),
                        RTObject::Value(max),
                    ) => target_list.list_with_sub_range(Self::list_min_bound(&min)?, Self::list_max_bound(&max)?),
                    _ => {
                        return Err(StoryError::InvalidStoryState(
                            "Expected List, minimum and maximum for LIST_RANGE".to_owned(),
                        ))
                    }
                };

                self.get_state_mut()
                    .push_evaluation_stack(RTObject::Value(ValueType::List(result)));
            }
            CommandType::ListRandom => {
                let list = match self.get_state_mut().pop_evaluation_stack()? {
                    RTObject::Value(ValueType::List(list)) => list,
                    _ => {
                        return Err(StoryError::InvalidStoryState(
                            "Expected list for LIST_RANDOM".to_owned(),
                        ))
                    }
                };

                let new_list = if list.items.is_empty() {
                    InkList::new()
                } else {
                    let next_random = self.next_random();
                    let list_item_index = next_random as usize % list.items.len();

                    // Ordered items keep the pick reproducible
                    let ordered = list.get_ordered_items();
                    let (item, value) = ordered[list_item_index];

                    let mut new_list = match item.get_origin_name() {
                        Some(origin) => InkList::from_single_origin_list_name(origin, &self.list_definitions)?,
                        None => InkList::new(),
                    };
                    new_list.items.insert(item.clone(), value);

                    self.get_state_mut().previous_random = next_random;

                    new_list
                };

                self.get_state_mut()
                    .push_evaluation_stack(RTObject::Value(ValueType::List(new_list)));
            }
            CommandType::BeginTag => self
                .get_state_mut()
                .push_to_output_stream(RTObject::ControlCommand(command)),
            CommandType::EndTag => self.perform_end_tag()?,
        }

        Ok(())
    }

    /// Next value of the story's random sequence, always non negative.
    fn next_random(&self) -> i32 {
        let result_seed = self
            .get_state()
            .story_seed
            .wrapping_add(self.get_state().previous_random);

        let mut rng = StdRng::seed_from_u64(result_seed as u64);
        rng.gen_range(0..i32::MAX)
    }

    /// Lower bound of LIST_RANGE: the smallest rank of a list, 0 when empty.
    fn list_min_bound(v: &ValueType) -> Result<i32, StoryError> {
        match v {
            ValueType::List(l) => Ok(l.get_min_item().1),
            other => Self::numeric_list_bound(other),
        }
    }

    /// Upper bound of LIST_RANGE: the largest rank of a list, unbounded when
    /// empty.
    fn list_max_bound(v: &ValueType) -> Result<i32, StoryError> {
        match v {
            ValueType::List(l) if l.is_empty() => Ok(i32::MAX),
            ValueType::List(l) => Ok(l.get_max_item().1),
            other => Self::numeric_list_bound(other),
        }
    }

    fn numeric_list_bound(v: &ValueType) -> Result<i32, StoryError> {
        match v {
            ValueType::Int(i) => Ok(*i),
            ValueType::Float(f) => Ok(*f as i32),
            _ => Err(StoryError::InvalidStoryState(
                "Expected List, minimum and maximum for LIST_RANGE".to_owned(),
            )),
        }
    }

    fn perform_pop(&mut self, command: CommandType) -> Result<(), StoryError> {
        let pop_type = if command == CommandType::PopFunction {
            PushPopType::Function
        } else {
            PushPopType::Tunnel
        };

        // `->-> target` returns from the tunnel straight into a divert
        let mut override_tunnel_return_target = None;
        if pop_type == PushPopType::Tunnel {
            match self.get_state_mut().pop_evaluation_stack()? {
                RTObject::Value(ValueType::DivertTarget(target)) => {
                    override_tunnel_return_target = Some(target)
                }
                RTObject::Void => {}
                _ => {
                    return Err(StoryError::InvalidStoryState(
                        "Expected void if ->-> doesn't override target".to_owned(),
                    ))
                }
            }
        }

        if self.get_state_mut().try_exit_function_evaluation_from_host() {
            return Ok(());
        }

        let callstack = self.get_state().get_callstack();
        let current_type = callstack.get_current_element().push_pop_type;

        if current_type != pop_type || !callstack.can_pop() {
            let name_of = |t: PushPopType| match t {
                PushPopType::Function => "function return statement (~ return)",
                PushPopType::Tunnel => "tunnel onwards statement (->->)",
                _ => "end of flow (-> END or choice)",
            };

            let expected = if callstack.can_pop() {
                name_of(current_type)
            } else {
                "end of flow (-> END or choice)"
            };

            return Err(StoryError::InvalidStoryState(format!(
                "Found {}, when expected {}",
                name_of(pop_type),
                expected
            )));
        }

        self.get_state_mut().pop_callstack(None);

        if let Some(target) = override_tunnel_return_target {
            let p = self.graph.pointer_at_path(&target)?;
            self.get_state_mut().diverted_pointer = p;
        }

        Ok(())
    }

    fn perform_end_string(&mut self) {
        let mut content_stack_for_string: Vec<String> = Vec::new();
        let mut content_to_retain: Vec<RTObject> = Vec::new();
        let mut output_count_consumed = 0;

        for obj in self.get_state().get_output_stream().iter().rev() {
            output_count_consumed += 1;

            match obj {
                RTObject::ControlCommand(CommandType::BeginString) => break,
                RTObject::Tag(_) => content_to_retain.push(obj.clone()),
                RTObject::Value(ValueType::String(s)) => content_stack_for_string.push(s.string.clone()),
                _ => {}
            }
        }

        self.get_state_mut().pop_from_output_stream(output_count_consumed);

        // Legacy tags generated by choice text stay in the output
        while let Some(rescue_tag) = content_to_retain.pop() {
            self.get_state_mut().push_to_output_stream(rescue_tag);
        }

        let sb: String = content_stack_for_string.iter().rev().map(String::as_str).collect();

        // Back to expression evaluation
        self.get_state_mut().set_in_expression_evaluation(true);
        self.get_state_mut()
            .push_evaluation_stack(RTObject::new_string(&sb));
    }

    fn perform_count_query(&mut self, command: CommandType) -> Result<(), StoryError> {
        let target = match self.get_state_mut().pop_evaluation_stack()? {
            RTObject::Value(ValueType::DivertTarget(target)) => target,
            other => {
                let extra_note = if matches!(other, RTObject::Value(ValueType::Int(_))) {
                    ". Did you accidentally pass a read count ('knot_name') instead of a target ('-> knot_name')?"
                } else {
                    ""
                };

                return Err(StoryError::InvalidStoryState(format!(
                    "TURNS_SINCE expected a divert target (knot, stitch, label name), but saw {}{}",
                    other, extra_note
                )));
            }
        };

        let container = self
            .graph
            .content_at_path(self.graph.root(), &target, 0, None)
            .correct_obj()
            .filter(|id| self.graph.get_container(*id).is_some());

        let either_count = match container {
            Some(container) => {
                if command == CommandType::TurnsSince {
                    self.get_state().turns_since_for_container(container)?
                } else {
                    self.get_state().visit_count_for_container(container)?
                }
            }
            None => {
                self.add_error(
                    &format!(
                        "Failed to find container for {} lookup at {}",
                        command.get_name(),
                        target
                    ),
                    true,
                );

                // Never visited: unknown turns, no reads
                if command == CommandType::TurnsSince {
                    -1
                } else {
                    0
                }
            }
        };

        self.get_state_mut()
            .push_evaluation_stack(RTObject::Value(ValueType::Int(either_count)));

        Ok(())
    }

    fn perform_list_from_int(&mut self) -> Result<(), StoryError> {
        let int_val = match self.get_state_mut().pop_evaluation_stack()? {
            RTObject::Value(ValueType::Int(v)) => v,
            _ => {
                return Err(StoryError::InvalidStoryState(
                    "Passed non-integer when creating a list element from a numerical value.".to_owned(),
                ))
            }
        };

        let list_name = match self.get_state_mut().pop_evaluation_stack()? {
            RTObject::Value(ValueType::String(s)) => s.string,
            _ => {
                return Err(StoryError::InvalidStoryState(
                    "Expected the name of a list when creating a list element from a numerical value.".to_owned(),
                ))
            }
        };

        let found_list_def = self
            .list_definitions
            .get_list_definition(&list_name)
            .ok_or_else(|| StoryError::InvalidStoryState(format!("Failed to find List called {}", list_name)))?;

        let generated_list = match found_list_def.get_item_with_value(int_val) {
            Some(found_item) => InkList::from_single_element(found_item, int_val),
            None => InkList::new(),
        };

        self.get_state_mut()
            .push_evaluation_stack(RTObject::Value(ValueType::List(generated_list)));

        Ok(())
    }

    fn perform_end_tag(&mut self) -> Result<(), StoryError> {
        // Inside string evaluation the tag belongs to choice text: it is
        // collected and left on the evaluation stack for the choice point.
        // Otherwise the output keeps [BeginTag, "text", EndTag].
        if !self.get_state().in_string_evaluation() {
            self.get_state_mut()
                .push_to_output_stream(RTObject::ControlCommand(CommandType::EndTag));
            return Ok(());
        }

        let mut content_stack_for_tag: Vec<String> = Vec::new();
        let mut output_count_consumed = 0;

        for obj in self.get_state().get_output_stream().iter().rev() {
            output_count_consumed += 1;

            match obj {
                RTObject::ControlCommand(CommandType::BeginTag) => break,
                RTObject::ControlCommand(_) => {
                    return Err(StoryError::InvalidStoryState(
                        "Unexpected ControlCommand while extracting tag from choice".to_owned(),
                    ))
                }
                RTObject::Value(ValueType::String(s)) => content_stack_for_tag.push(s.string.clone()),
                _ => {}
            }
        }

        self.get_state_mut().pop_from_output_stream(output_count_consumed);

        let sb: String = content_stack_for_tag.iter().rev().map(String::as_str).collect();

        let choice_tag = Tag::new(&StoryState::clean_output_whitespace(&sb));
        self.get_state_mut()
            .push_evaluation_stack(RTObject::Tag(choice_tag));

        Ok(())
    }

    fn perform_variable_assignment(&mut self, var_ass: &VariableAssignment) -> Result<(), StoryError> {
        let assigned_val = match self.get_state_mut().pop_evaluation_stack()? {
            RTObject::Value(v) => v,
            other => {
                return Err(StoryError::InvalidStoryState(format!(
                    "Can't assign {} to variable {}",
                    other, var_ass.variable_name
                )))
            }
        };

        self.get_state_mut().assign_variable(var_ass, assigned_val)
    }

    fn perform_variable_reference(
        &mut self,
        var_ref: &VariableReference,
        own_id: ObjectId,
    ) -> Result<(), StoryError> {
        let found_value = match &var_ref.path_for_count {
            // Read count of a container
            Some(path_for_count) => {
                let result = self.graph.resolve_path(own_id, path_for_count);
                let container = result
                    .correct_obj()
                    .and_then(|_| result.container(&self.graph))
                    .ok_or_else(|| {
                        StoryError::InvalidStoryState(format!(
                            "Container for read count not found: {}",
                            path_for_count
                        ))
                    })?;

                ValueType::Int(self.get_state().visit_count_for_container(container)?)
            }
            None => match self.get_state().get_variable_with_name(&var_ref.name, -1)? {
                Some(v) => v,
                None => {
                    self.add_error(&format!("Variable not found: '{}'. Using default value of 0 (false). This can happen with temporary variables if the declaration hasn't yet been hit. Globals are always given a default value on load if a value doesn't exist in the save state.", var_ref.name), true);

                    ValueType::Int(0)
                }
            },
        };

        self.get_state_mut()
            .push_evaluation_stack(RTObject::Value(found_value));

        Ok(())
    }

    fn perform_native_function_call(&mut self, op: Op) -> Result<(), StoryError> {
        let func_params = self
            .get_state_mut()
            .pop_evaluation_stack_multiple(op.get_number_of_parameters())?;

        let result = op.call(func_params)?;
        self.get_state_mut()
            .push_evaluation_stack(RTObject::Value(result));

        Ok(())
    }
}
